//! JSON response envelope shared by both services
//!
//! Every handler except `/env` and the authenticated `/protected` answer
//! replies with the same shape:
//!
//! ```json
//! {"service":"api","status":"ok","port":"3456","timestamp":"2024-05-01T12:30:45Z","message":"..."}
//! ```

use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

/// Body of a standard response
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Envelope {
    pub service: String,
    pub status: String,
    pub port: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// An envelope paired with the HTTP status it is sent with
#[derive(Debug)]
pub struct JsonReply {
    pub code: StatusCode,
    pub envelope: Envelope,
}

impl IntoResponse for JsonReply {
    fn into_response(self) -> Response {
        json_response(self.code, &self.envelope, false)
    }
}

/// Serialize `body` and attach `Content-Type: application/json`
///
/// `pretty` switches to two-space indented output, used by `/env` and
/// `/protected`.
pub fn json_response<T: Serialize>(code: StatusCode, body: &T, pretty: bool) -> Response {
    let encoded = if pretty {
        serde_json::to_string_pretty(body)
    } else {
        serde_json::to_string(body)
    };

    match encoded {
        Ok(mut text) => {
            text.push('\n');
            let mut response = (code, text).into_response();
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            error!(error = %e, "Failed to encode JSON response");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode response").into_response()
        }
    }
}
