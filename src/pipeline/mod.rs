//! Fixed-order request pipeline.
//!
//! Every request, including requests for unknown paths, flows through the
//! same ordered list of stages before any handler runs:
//!
//! 1. **security_headers** - policy applied to whatever response comes out
//! 2. **rate_limit** - per-client fixed window
//! 3. **decode** - cookies and the JSON or form body
//! 4. **request_log** - marks the request for the completion log line
//! 5. **authenticate** - credential check on protected routes
//! 6. **validate** - payload schema for the route
//! 7. **handler**
//! 8. **error_log** / **error_translate** - the error tail
//!
//! A stage either completes or raises exactly one [`ApiError`]. The first
//! error skips every remaining stage and the handler, and goes straight to
//! the tail.

pub mod context;
pub mod routes;

pub use context::{RequestContext, RequestId};
pub use routes::{RouteTable, Zone};

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{request::Parts, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::Instrument;

use crate::config::SecurityHeadersConfig;
use crate::error::{ApiError, RaisedError, Result};
use crate::middleware::{error_response, metrics, request_log, security_headers};

/// One step of the pipeline
#[async_trait]
pub trait Stage: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &mut RequestContext) -> Result<()>;
}

/// A type-erased stage that can be stored in the ordered list
pub type BoxedStage = Arc<dyn Stage>;

const LEADING_STAGES: [&str; 1] = ["security_headers"];
const TRAILING_STAGES: [&str; 3] = ["handler", "error_log", "error_translate"];

/// The pipeline: route classification, ordered stages and the error tail
pub struct Pipeline {
    security: SecurityHeadersConfig,
    routes: RouteTable,
    stages: Vec<BoxedStage>,
}

impl Pipeline {
    pub fn new(security: SecurityHeadersConfig, routes: RouteTable, stages: Vec<BoxedStage>) -> Self {
        Self {
            security,
            routes,
            stages,
        }
    }

    /// The full execution order, including the wrapping stages
    pub fn stage_names(&self) -> Vec<&'static str> {
        LEADING_STAGES
            .into_iter()
            .chain(self.stages.iter().map(|stage| stage.name()))
            .chain(TRAILING_STAGES)
            .collect()
    }

    /// Run one request through the stages, the handler and the tail
    pub async fn handle<H, Fut>(&self, request: Request, handler: H) -> Response
    where
        H: FnOnce(Request) -> Fut,
        Fut: Future<Output = Response>,
    {
        let _in_flight = metrics::InFlight::start();
        let (mut parts, body) = request.into_parts();
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let zone = self.routes.classify(&parts.method, parts.uri.path());
        let mut ctx = RequestContext::new(&mut parts, body, zone, peer);
        let hsts = security_headers::wants_hsts(&self.security, &ctx.headers);

        let span = tracing::info_span!("request", request_id = %ctx.request_id.as_str());
        let mut response = self
            .dispatch(&mut ctx, parts, handler)
            .instrument(span)
            .await;

        if ctx.log_request {
            request_log::log_request(&ctx, response.status());
        }
        metrics::record_request(
            &ctx.method,
            &ctx.path,
            response.status(),
            ctx.started_at.elapsed(),
        );

        let headers = response.headers_mut();
        if let Some(status) = ctx.rate_limit.as_ref().filter(|s| s.allowed) {
            status.apply_headers(headers);
        }
        if let Ok(value) = HeaderValue::from_str(ctx.request_id.as_str()) {
            headers.insert("x-request-id", value);
        }
        security_headers::apply(&self.security, headers, hsts);
        response
    }

    async fn dispatch<H, Fut>(&self, ctx: &mut RequestContext, mut parts: Parts, handler: H) -> Response
    where
        H: FnOnce(Request) -> Fut,
        Fut: Future<Output = Response>,
    {
        if let Err(err) = self.run_stages(ctx).await {
            return fail(ctx, &err);
        }

        ctx.restore(&mut parts);
        let mut response = handler(Request::from_parts(parts, Body::empty())).await;

        if let Some(RaisedError(err)) = response.extensions_mut().remove::<RaisedError>() {
            return fail(ctx, &err);
        }
        match error_response::from_status(response.status()) {
            Some(err) => fail(ctx, &err),
            None => response,
        }
    }

    async fn run_stages(&self, ctx: &mut RequestContext) -> Result<()> {
        for stage in &self.stages {
            stage.run(ctx).await?;
            tracing::trace!(stage = stage.name(), "stage completed");
        }
        Ok(())
    }
}

/// The error tail: log once with full detail, then translate
fn fail(ctx: &RequestContext, err: &ApiError) -> Response {
    request_log::log_error(ctx, err);
    error_response::translate(err)
}

/// Axum entry point, applied to the whole router (fallback included)
pub async fn pipeline_middleware(
    State(pipeline): State<Arc<Pipeline>>,
    request: Request,
    next: Next,
) -> Response {
    pipeline
        .handle(request, move |request| next.run(request))
        .await
}
