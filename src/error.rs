//! Error taxonomy: semantic error kinds bound to canonical HTTP statuses and
//! wire-visible names.
//!
//! Every error a handler can report is a variant of [`HttpError`]. Each named
//! variant maps to exactly one status code and one wire name; the mapping is
//! fixed for the life of the process. Error bodies always look like
//!
//! ```json
//! {"description": "upstream store is down", "error": "ServiceUnavailable"}
//! ```
//!
//! A process-wide flag switches the `error` field between `PascalCase` and
//! `snake_case` spellings — see [`set_snake_case_wire_names`].
//!
//! [`HttpError::Generic`] wraps an arbitrary message/status pair without
//! declaring a new named kind. Its wire name is always the fixed string
//! `"error"`, and a status below 100 is reported as 500.

use std::sync::atomic::{AtomicBool, Ordering};

use http::StatusCode;
use http::header::CONTENT_TYPE;
use serde::Serialize;
use thiserror::Error;

use crate::response::Response;

static SNAKE_CASE_WIRE_NAMES: AtomicBool = AtomicBool::new(false);

/// Selects `snake_case` (`true`) or `PascalCase` (`false`, the default) wire
/// error names for the whole process. Call once at startup, before serving.
pub fn set_snake_case_wire_names(enabled: bool) {
    SNAKE_CASE_WIRE_NAMES.store(enabled, Ordering::Relaxed);
}

fn snake_case_wire_names() -> bool {
    SNAKE_CASE_WIRE_NAMES.load(Ordering::Relaxed)
}

/// A semantic error kind carrying its message.
///
/// Returned by handlers through the marshaling layer, which maps it to a
/// status and a JSON error body. Every named variant owns one canonical
/// status; [`HttpError::Generic`] carries its own.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    PaymentRequired(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    MethodNotAllowed(String),
    #[error("{0}")]
    NotAcceptable(String),
    #[error("{0}")]
    ProxyAuthRequired(String),
    #[error("{0}")]
    RequestTimeout(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Gone(String),
    #[error("{0}")]
    LengthRequired(String),
    #[error("{0}")]
    PreconditionFailed(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("{0}")]
    UriTooLong(String),
    #[error("{0}")]
    UnsupportedMediaType(String),
    #[error("{0}")]
    RangeNotSatisfiable(String),
    #[error("{0}")]
    ExpectationFailed(String),
    #[error("{0}")]
    UnprocessableEntity(String),
    #[error("{0}")]
    TooManyRequests(String),
    #[error("{0}")]
    InternalServerError(String),
    #[error("{0}")]
    NotImplemented(String),
    #[error("{0}")]
    BadGateway(String),
    #[error("{0}")]
    ServiceUnavailable(String),
    #[error("{0}")]
    GatewayTimeout(String),
    #[error("{0}")]
    HttpVersionNotSupported(String),
    /// An arbitrary message/status pair with the generic wire name `"error"`.
    #[error("{message}")]
    Generic { status: u16, message: String },
}

impl HttpError {
    /// The canonical HTTP status for this kind.
    ///
    /// `Generic` statuses outside the valid range collapse to 500 — a handler
    /// that never picked a status still produces a well-formed response.
    pub fn status(&self) -> StatusCode {
        use HttpError::*;
        match self {
            BadRequest(_) => StatusCode::BAD_REQUEST,
            Unauthorized(_) => StatusCode::UNAUTHORIZED,
            PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            Forbidden(_) => StatusCode::FORBIDDEN,
            NotFound(_) => StatusCode::NOT_FOUND,
            MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            ProxyAuthRequired(_) => StatusCode::PROXY_AUTHENTICATION_REQUIRED,
            RequestTimeout(_) => StatusCode::REQUEST_TIMEOUT,
            Conflict(_) => StatusCode::CONFLICT,
            Gone(_) => StatusCode::GONE,
            LengthRequired(_) => StatusCode::LENGTH_REQUIRED,
            PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            UriTooLong(_) => StatusCode::URI_TOO_LONG,
            UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            RangeNotSatisfiable(_) => StatusCode::RANGE_NOT_SATISFIABLE,
            ExpectationFailed(_) => StatusCode::EXPECTATION_FAILED,
            UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            BadGateway(_) => StatusCode::BAD_GATEWAY,
            ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            HttpVersionNotSupported(_) => StatusCode::HTTP_VERSION_NOT_SUPPORTED,
            Generic { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    /// The wire-visible name written to the `error` field of error bodies,
    /// in the spelling selected by [`set_snake_case_wire_names`].
    pub fn wire_name(&self) -> &'static str {
        if snake_case_wire_names() { self.snake_name() } else { self.pascal_name() }
    }

    /// Picks the named kind for a known status, else falls back to
    /// [`HttpError::Generic`] — the status→kind direction of the table.
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        use HttpError::*;
        let message = message.into();
        match status {
            StatusCode::BAD_REQUEST => BadRequest(message),
            StatusCode::UNAUTHORIZED => Unauthorized(message),
            StatusCode::PAYMENT_REQUIRED => PaymentRequired(message),
            StatusCode::FORBIDDEN => Forbidden(message),
            StatusCode::NOT_FOUND => NotFound(message),
            StatusCode::METHOD_NOT_ALLOWED => MethodNotAllowed(message),
            StatusCode::NOT_ACCEPTABLE => NotAcceptable(message),
            StatusCode::PROXY_AUTHENTICATION_REQUIRED => ProxyAuthRequired(message),
            StatusCode::REQUEST_TIMEOUT => RequestTimeout(message),
            StatusCode::CONFLICT => Conflict(message),
            StatusCode::GONE => Gone(message),
            StatusCode::LENGTH_REQUIRED => LengthRequired(message),
            StatusCode::PRECONDITION_FAILED => PreconditionFailed(message),
            StatusCode::PAYLOAD_TOO_LARGE => PayloadTooLarge(message),
            StatusCode::URI_TOO_LONG => UriTooLong(message),
            StatusCode::UNSUPPORTED_MEDIA_TYPE => UnsupportedMediaType(message),
            StatusCode::RANGE_NOT_SATISFIABLE => RangeNotSatisfiable(message),
            StatusCode::EXPECTATION_FAILED => ExpectationFailed(message),
            StatusCode::UNPROCESSABLE_ENTITY => UnprocessableEntity(message),
            StatusCode::TOO_MANY_REQUESTS => TooManyRequests(message),
            StatusCode::INTERNAL_SERVER_ERROR => InternalServerError(message),
            StatusCode::NOT_IMPLEMENTED => NotImplemented(message),
            StatusCode::BAD_GATEWAY => BadGateway(message),
            StatusCode::SERVICE_UNAVAILABLE => ServiceUnavailable(message),
            StatusCode::GATEWAY_TIMEOUT => GatewayTimeout(message),
            StatusCode::HTTP_VERSION_NOT_SUPPORTED => HttpVersionNotSupported(message),
            _ => Generic { status: status.as_u16(), message },
        }
    }

    fn pascal_name(&self) -> &'static str {
        use HttpError::*;
        match self {
            BadRequest(_) => "BadRequest",
            Unauthorized(_) => "Unauthorized",
            PaymentRequired(_) => "PaymentRequired",
            Forbidden(_) => "Forbidden",
            NotFound(_) => "NotFound",
            MethodNotAllowed(_) => "MethodNotAllowed",
            NotAcceptable(_) => "NotAcceptable",
            ProxyAuthRequired(_) => "ProxyAuthRequired",
            RequestTimeout(_) => "RequestTimeout",
            Conflict(_) => "Conflict",
            Gone(_) => "Gone",
            LengthRequired(_) => "LengthRequired",
            PreconditionFailed(_) => "PreconditionFailed",
            PayloadTooLarge(_) => "PayloadTooLarge",
            UriTooLong(_) => "UriTooLong",
            UnsupportedMediaType(_) => "UnsupportedMediaType",
            RangeNotSatisfiable(_) => "RangeNotSatisfiable",
            ExpectationFailed(_) => "ExpectationFailed",
            UnprocessableEntity(_) => "UnprocessableEntity",
            TooManyRequests(_) => "TooManyRequests",
            InternalServerError(_) => "InternalServerError",
            NotImplemented(_) => "NotImplemented",
            BadGateway(_) => "BadGateway",
            ServiceUnavailable(_) => "ServiceUnavailable",
            GatewayTimeout(_) => "GatewayTimeout",
            HttpVersionNotSupported(_) => "HttpVersionNotSupported",
            Generic { .. } => "error",
        }
    }

    fn snake_name(&self) -> &'static str {
        use HttpError::*;
        match self {
            BadRequest(_) => "bad_request",
            Unauthorized(_) => "unauthorized",
            PaymentRequired(_) => "payment_required",
            Forbidden(_) => "forbidden",
            NotFound(_) => "not_found",
            MethodNotAllowed(_) => "method_not_allowed",
            NotAcceptable(_) => "not_acceptable",
            ProxyAuthRequired(_) => "proxy_auth_required",
            RequestTimeout(_) => "request_timeout",
            Conflict(_) => "conflict",
            Gone(_) => "gone",
            LengthRequired(_) => "length_required",
            PreconditionFailed(_) => "precondition_failed",
            PayloadTooLarge(_) => "payload_too_large",
            UriTooLong(_) => "uri_too_long",
            UnsupportedMediaType(_) => "unsupported_media_type",
            RangeNotSatisfiable(_) => "range_not_satisfiable",
            ExpectationFailed(_) => "expectation_failed",
            UnprocessableEntity(_) => "unprocessable_entity",
            TooManyRequests(_) => "too_many_requests",
            InternalServerError(_) => "internal_server_error",
            NotImplemented(_) => "not_implemented",
            BadGateway(_) => "bad_gateway",
            ServiceUnavailable(_) => "service_unavailable",
            GatewayTimeout(_) => "gateway_timeout",
            HttpVersionNotSupported(_) => "http_version_not_supported",
            Generic { .. } => "error",
        }
    }
}

/// The wire shape of every error body.
#[derive(Serialize)]
pub(crate) struct ErrorBody<'a> {
    pub description: &'a str,
    pub error: &'a str,
}

/// Renders an error as a full response: JSON body when the client accepts
/// JSON, plain text otherwise.
pub(crate) fn error_response(err: &HttpError, json: bool) -> Response {
    let description = err.to_string();
    if json {
        let body = serde_json::to_vec(&ErrorBody {
            description: &description,
            error: err.wire_name(),
        })
        .unwrap_or_default();
        let mut response = Response::from_parts(err.status(), http::HeaderMap::new(), body);
        response.insert_header(CONTENT_TYPE, "application/json");
        response
    } else {
        Response::builder().status(err.status()).text(description)
    }
}
