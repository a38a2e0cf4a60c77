//! HTTP transport seam.
//!
//! `HttpTransport` is implemented on top of `reqwest` by the
//! `printpush-octoprint` crate. Using a trait keeps the session decoupled from
//! the HTTP stack and testable with mocks.

use std::future::Future;
use std::pin::Pin;

use printpush_protocol::Endpoint;
use printpush_protocol::constants::{API_KEY_HEADER, USER_AGENT};
use printpush_transfer::MultipartBody;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// A fully built upload request.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub url: String,
    /// Extra headers; `Content-Type` comes from `body`.
    pub headers: Vec<(String, String)>,
    pub body: MultipartBody,
}

impl UploadRequest {
    /// Builds the upload request for `endpoint`.
    pub fn for_endpoint(endpoint: &Endpoint, body: MultipartBody) -> Self {
        Self {
            url: endpoint.upload_url(),
            headers: vec![
                ("User-Agent".to_string(), USER_AGENT.to_string()),
                (API_KEY_HEADER.to_string(), endpoint.api_key().to_string()),
            ],
            body,
        }
    }

    /// Looks up a header value, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The server's answer to an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Canonical reason phrase for `status`.
    pub reason: String,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Human-readable failure reason: the response body when the server sent
    /// one, the status reason phrase otherwise.
    pub fn failure_reason(&self) -> String {
        let body = self.body.trim();
        if body.is_empty() {
            self.reason.clone()
        } else {
            body.to_string()
        }
    }
}

/// Side-channel notifications a transport emits while a request runs.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportSignal {
    /// `sent` of `total` body bytes handed to the connection.
    UploadProgress { sent: u64, total: u64 },
    /// Certificate problems on the connection.
    TlsWarning(Vec<String>),
    /// The server asked for an authentication scheme other than the API key.
    AuthChallenge { scheme: String },
}

/// Issues upload requests.
///
/// Dropping the returned future must abort the request.
pub trait HttpTransport: Send + Sync {
    /// Sends `request` and resolves with the server's response.
    ///
    /// Progress, TLS and auth notifications are sent on `signals` while the
    /// request is in flight; send errors are ignored.
    fn post(
        &self,
        request: UploadRequest,
        signals: mpsc::UnboundedSender<TransportSignal>,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use printpush_transfer::MultipartForm;

    #[test]
    fn request_carries_fixed_headers() {
        let ep = Endpoint::new("OctoPrint", "http://octopi.local/", "s3cret");
        let req = UploadRequest::for_endpoint(&ep, MultipartForm::with_boundary("b").finish());

        assert_eq!(req.url, "http://octopi.local/api/files/local");
        assert_eq!(req.header("x-api-key"), Some("s3cret"));
        assert_eq!(req.header("user-agent"), Some(USER_AGENT));
        assert_eq!(req.header("authorization"), None);
    }

    #[test]
    fn failure_reason_prefers_body() {
        let resp = HttpResponse {
            status: 500,
            reason: "Internal Server Error".into(),
            body: "  disk full\n".into(),
        };
        assert!(!resp.is_success());
        assert_eq!(resp.failure_reason(), "disk full");
    }

    #[test]
    fn failure_reason_falls_back_to_status() {
        let resp = HttpResponse {
            status: 409,
            reason: "Conflict".into(),
            body: String::new(),
        };
        assert_eq!(resp.failure_reason(), "Conflict");
    }

    #[test]
    fn two_hundreds_are_success() {
        for status in [200, 201, 204] {
            let resp = HttpResponse {
                status,
                reason: String::new(),
                body: String::new(),
            };
            assert!(resp.is_success());
        }
    }
}
