//! Pipeline stages and the pieces of the error tail
//!
//! - rate limiting, body decoding, request logging, authentication and
//!   payload validation, each a [`crate::pipeline::Stage`]
//! - error translation and security headers, applied to every response
//! - request metrics

pub mod auth;
pub mod decode;
pub mod error_response;
pub mod metrics;
pub mod rate_limit;
pub mod request_log;
pub mod security_headers;
pub mod validation;

pub use auth::{Authenticate, Identity};
pub use decode::{Cookies, Decode, DecodedBody};
pub use error_response::translate;
pub use rate_limit::{RateLimit, RateLimiter};
pub use request_log::RequestLog;
pub use validation::{SchemaRegistry, ValidatePayload};
