//! Declarative payload validation, run before the handler.
//!
//! A [`Schema`] lists the fields a route accepts. Validation walks the whole
//! payload and reports every failing field with a stable reason code instead
//! of stopping at the first problem. A payload that passes is forwarded
//! unchanged.

use crate::error::{ApiError, FieldError, FieldReason, Result};
use crate::pipeline::{RequestContext, Stage};
use async_trait::async_trait;
use axum::http::Method;
use serde_json::Value;
use validator::ValidateEmail;

/// What a field's value must look like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Email-shaped string
    Email,
    /// String whose length in characters is within bounds
    Text { min: usize, max: Option<usize> },
    /// Absolute http(s) URL
    Url,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRule {
    pub name: &'static str,
    pub required: bool,
    pub kind: FieldKind,
}

impl FieldRule {
    pub fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            required: true,
            kind,
        }
    }

    pub fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            required: false,
            kind,
        }
    }

    fn check(&self, value: Option<&Value>) -> Option<FieldError> {
        let value = match value {
            None | Some(Value::Null) if self.required => {
                return Some(FieldError::new(
                    self.name,
                    FieldReason::Required,
                    format!("{} is required", self.name),
                ))
            }
            None | Some(Value::Null) => return None,
            Some(value) => value,
        };

        let Some(text) = value.as_str() else {
            return Some(FieldError::new(
                self.name,
                FieldReason::Type,
                format!("{} must be a string", self.name),
            ));
        };

        match self.kind {
            FieldKind::Email if !text.validate_email() => Some(FieldError::new(
                self.name,
                FieldReason::Email,
                format!("{} must be a valid email address", self.name),
            )),
            FieldKind::Url if !is_http_url(text) => Some(FieldError::new(
                self.name,
                FieldReason::Url,
                format!("{} must be an http(s) URL", self.name),
            )),
            FieldKind::Text { min, max } => {
                let len = text.chars().count();
                let too_long = max.is_some_and(|max| len > max);
                if len < min || too_long {
                    let message = match max {
                        Some(max) => format!("{} must be {min} to {max} characters", self.name),
                        None => format!("{} must be at least {min} characters", self.name),
                    };
                    Some(FieldError::new(self.name, FieldReason::Length, message))
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

fn is_http_url(text: &str) -> bool {
    url::Url::parse(text)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
        .unwrap_or(false)
}

/// The accepted shape of one route's payload
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<FieldRule>,
    allow_unknown: bool,
}

impl Schema {
    pub fn new(fields: Vec<FieldRule>) -> Self {
        Self {
            fields,
            allow_unknown: false,
        }
    }

    pub fn allow_unknown(mut self) -> Self {
        self.allow_unknown = true;
        self
    }

    /// Collect every failing field, in schema order followed by unknown keys
    pub fn check(&self, payload: &Value) -> Vec<FieldError> {
        let object = match payload {
            Value::Object(object) => object,
            _ => {
                return vec![FieldError::new(
                    "body",
                    FieldReason::Type,
                    "body must be an object",
                )]
            }
        };

        let mut errors: Vec<FieldError> = self
            .fields
            .iter()
            .filter_map(|rule| rule.check(object.get(rule.name)))
            .collect();

        if !self.allow_unknown {
            let mut unknown: Vec<&String> = object
                .keys()
                .filter(|key| !self.fields.iter().any(|rule| rule.name == key.as_str()))
                .collect();
            unknown.sort();
            errors.extend(unknown.into_iter().map(|key| {
                FieldError::new(
                    key.clone(),
                    FieldReason::Unknown,
                    format!("{key} is not allowed"),
                )
            }));
        }
        errors
    }

    pub fn validate(&self, payload: &Value) -> Result<()> {
        let errors = self.check(payload);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::ValidationFailed(errors))
        }
    }
}

/// Schemas by exact `(method, path)`
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: Vec<(Method, &'static str, Schema)>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, method: Method, path: &'static str, schema: Schema) -> Self {
        self.schemas.retain(|(m, p, _)| !(*m == method && *p == path));
        self.schemas.push((method, path, schema));
        self
    }

    pub fn get(&self, method: &Method, path: &str) -> Option<&Schema> {
        self.schemas
            .iter()
            .find(|(m, p, _)| m == method && *p == path)
            .map(|(_, _, schema)| schema)
    }

    /// Account and resource payloads accepted by the service
    pub fn standard() -> Self {
        let name = FieldKind::Text {
            min: 2,
            max: Some(30),
        };
        let display = FieldKind::Text {
            min: 1,
            max: Some(30),
        };
        let password = FieldKind::Text { min: 1, max: None };

        Self::new()
            .register(
                Method::POST,
                "/signup",
                Schema::new(vec![
                    FieldRule::required("email", FieldKind::Email),
                    FieldRule::required("password", password),
                    FieldRule::optional("name", display),
                    FieldRule::optional("about", display),
                    FieldRule::optional("avatar", FieldKind::Url),
                ]),
            )
            .register(
                Method::POST,
                "/signin",
                Schema::new(vec![
                    FieldRule::required("email", FieldKind::Email),
                    FieldRule::required("password", password),
                ]),
            )
            .register(
                Method::PATCH,
                "/users/me",
                Schema::new(vec![
                    FieldRule::required("name", name),
                    FieldRule::required("about", name),
                ]),
            )
            .register(
                Method::PATCH,
                "/users/me/avatar",
                Schema::new(vec![FieldRule::required("avatar", FieldKind::Url)]),
            )
            .register(
                Method::POST,
                "/cards",
                Schema::new(vec![
                    FieldRule::required("name", name),
                    FieldRule::required("link", FieldKind::Url),
                ]),
            )
    }
}

/// Pipeline stage applying the route's schema, if it has one
pub struct ValidatePayload {
    registry: SchemaRegistry,
}

impl ValidatePayload {
    pub fn new(registry: SchemaRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Stage for ValidatePayload {
    fn name(&self) -> &'static str {
        "validate"
    }

    async fn run(&self, ctx: &mut RequestContext) -> Result<()> {
        match self.registry.get(&ctx.method, &ctx.path) {
            Some(schema) => schema.validate(&ctx.body),
            None => Ok(()),
        }
    }
}
