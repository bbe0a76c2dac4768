//! Body and cookie decoding.
//!
//! Bodies are read once, up to the configured size limit, and decoded by
//! MIME type: JSON objects, or URL-encoded forms with bracketed keys
//! (`user[name]=x`, `tags[]=a`). Anything syntactically wrong fails closed
//! with `MalformedRequest`; a missing body decodes to an empty object.

use crate::config::BodyConfig;
use crate::error::{ApiError, Result};
use crate::pipeline::{RequestContext, Stage};
use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::header;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Decoded request body, placed in request extensions for handlers
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBody(pub Value);

/// Cookies sent with the request; the first occurrence of a name wins
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies(HashMap<String, String>);

impl Cookies {
    /// Parse every `Cookie` header of a request
    pub fn parse<'a>(headers: impl IntoIterator<Item = &'a header::HeaderValue>) -> Result<Self> {
        let mut cookies = HashMap::new();
        for value in headers {
            let raw = value
                .to_str()
                .map_err(|_| ApiError::MalformedRequest("Cookie header is not valid text".into()))?;
            for pair in raw.split(';') {
                let Some((name, value)) = pair.split_once('=') else {
                    continue;
                };
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                cookies
                    .entry(name.to_string())
                    .or_insert_with(|| decode_cookie_value(value.trim()));
            }
        }
        Ok(Self(cookies))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

fn decode_cookie_value(value: &str) -> String {
    let unquoted = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    urlencoding::decode(unquoted)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| unquoted.to_string())
}

/// Supported body encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
    Other,
}

fn body_kind(content_type: Option<&str>) -> BodyKind {
    let essence = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();
    match essence.as_str() {
        "application/json" => BodyKind::Json,
        "application/x-www-form-urlencoded" => BodyKind::Form,
        other if other.starts_with("application/") && other.ends_with("+json") => BodyKind::Json,
        _ => BodyKind::Other,
    }
}

/// Decode a JSON body; only objects are accepted
pub fn decode_json(bytes: &[u8]) -> Result<Value> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(ApiError::MalformedRequest(
            "JSON body must be an object".to_string(),
        )),
        Err(e) => Err(ApiError::MalformedRequest(format!("Invalid JSON: {e}"))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Push,
}

/// Split `a[b][]` into the root `a` and its bracket segments
fn parse_key(raw: &str) -> Result<(String, Vec<Segment>)> {
    let open = match raw.find('[') {
        Some(i) if i > 0 => i,
        _ => return Ok((raw.to_string(), Vec::new())),
    };

    let root = raw[..open].to_string();
    let mut rest = &raw[open..];
    let mut segments = Vec::new();
    while let Some(inner) = rest.strip_prefix('[') {
        let Some(close) = inner.find(']') else {
            // Unbalanced brackets: the whole key is a plain name
            return Ok((raw.to_string(), Vec::new()));
        };
        let name = &inner[..close];
        segments.push(if name.is_empty() {
            Segment::Push
        } else {
            Segment::Key(name.to_string())
        });
        rest = &inner[close + 1..];
    }
    if !rest.is_empty() {
        return Err(malformed_form(format!("unexpected text after brackets in key {raw:?}")));
    }
    Ok((root, segments))
}

fn malformed_form(detail: String) -> ApiError {
    ApiError::MalformedRequest(format!("Invalid form body: {detail}"))
}

fn conflict(key: &str) -> ApiError {
    malformed_form(format!("conflicting shapes for key {key:?}"))
}

fn insert_form_value(
    target: &mut Map<String, Value>,
    key: &str,
    rest: &[Segment],
    value: String,
) -> Result<()> {
    match rest.first() {
        None => match target.get_mut(key) {
            None => {
                target.insert(key.to_string(), Value::String(value));
            }
            Some(Value::Array(items)) => items.push(Value::String(value)),
            Some(slot @ Value::String(_)) => {
                let previous = std::mem::take(slot);
                *slot = Value::Array(vec![previous, Value::String(value)]);
            }
            Some(_) => return Err(conflict(key)),
        },
        Some(Segment::Push) => {
            let element = match rest.get(1) {
                None => Value::String(value),
                Some(Segment::Key(child)) => {
                    let mut object = Map::new();
                    insert_form_value(&mut object, child, &rest[2..], value)?;
                    Value::Object(object)
                }
                Some(Segment::Push) => {
                    return Err(malformed_form(format!("nested arrays under key {key:?}")))
                }
            };
            let slot = target
                .entry(key.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            match slot {
                Value::Array(items) => items.push(element),
                Value::String(_) if rest.len() == 1 => {
                    let previous = std::mem::take(slot);
                    *slot = Value::Array(vec![previous, element]);
                }
                _ => return Err(conflict(key)),
            }
        }
        Some(Segment::Key(child)) => match target
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()))
        {
            Value::Object(object) => insert_form_value(object, child, &rest[1..], value)?,
            _ => return Err(conflict(key)),
        },
    }
    Ok(())
}

/// Decode an URL-encoded body with bracketed nesting into a JSON object
pub fn decode_form(bytes: &[u8], max_depth: usize, max_params: usize) -> Result<Value> {
    let mut root = Map::new();
    for (count, (key, value)) in url::form_urlencoded::parse(bytes).enumerate() {
        if count >= max_params {
            return Err(malformed_form(format!("more than {max_params} parameters")));
        }
        if key.is_empty() {
            continue;
        }
        let (name, segments) = parse_key(&key)?;
        if segments.len() > max_depth {
            return Err(malformed_form(format!(
                "key {name:?} nests deeper than {max_depth} levels"
            )));
        }
        insert_form_value(&mut root, &name, &segments, value.into_owned())?;
    }
    Ok(Value::Object(root))
}

/// Read the whole body, failing once it exceeds `limit` bytes
async fn read_limited(body: Body, limit: usize) -> Result<Bytes> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(ApiError::PayloadTooLarge { limit })
        }
        Err(e) => Err(ApiError::MalformedRequest(format!(
            "Failed to read request body: {e}"
        ))),
    }
}

/// Pipeline stage decoding cookies and the request body
pub struct Decode {
    config: BodyConfig,
}

impl Decode {
    pub fn new(config: BodyConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Stage for Decode {
    fn name(&self) -> &'static str {
        "decode"
    }

    async fn run(&self, ctx: &mut RequestContext) -> Result<()> {
        ctx.cookies = Cookies::parse(ctx.headers.get_all(header::COOKIE))?;

        let declared = ctx
            .header(header::CONTENT_LENGTH.as_str())
            .and_then(|len| len.parse::<usize>().ok());
        if declared.is_some_and(|len| len > self.config.max_bytes) {
            return Err(ApiError::PayloadTooLarge {
                limit: self.config.max_bytes,
            });
        }

        let Some(body) = ctx.take_body() else {
            return Ok(());
        };
        let bytes = read_limited(body, self.config.max_bytes).await?;
        if bytes.is_empty() {
            return Ok(());
        }

        let kind = body_kind(ctx.header(header::CONTENT_TYPE.as_str()));
        ctx.body = match kind {
            BodyKind::Json => decode_json(&bytes)?,
            BodyKind::Form => decode_form(
                &bytes,
                self.config.max_form_depth,
                self.config.max_form_params,
            )?,
            BodyKind::Other => {
                return Err(ApiError::MalformedRequest(
                    "Unsupported request body content type".to_string(),
                ))
            }
        };
        Ok(())
    }
}
