//! OctoPrint HTTP transport.
//!
//! Async HTTP client using `reqwest`; the API key travels in the
//! `X-Api-Key` header the session puts on every request.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::stream::{self, Stream};
use printpush_protocol::Endpoint;
use printpush_transfer::BODY_CHUNK_SIZE;
use printpush_upload::{
    HttpResponse, HttpTransport, TransportError, TransportSignal, UploadRequest, UploadSession,
};
use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderName, HeaderValue, WWW_AUTHENTICATE};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Uploads requests to an OctoPrint server.
pub struct OctoPrintTransport {
    http: reqwest::Client,
    accept_invalid_certs: bool,
    chunk_size: usize,
}

impl OctoPrintTransport {
    /// Creates a transport honouring the endpoint's TLS policy and timeout.
    pub fn new(endpoint: &Endpoint) -> Result<Self, TransportError> {
        let mut builder =
            reqwest::Client::builder().danger_accept_invalid_certs(endpoint.accept_invalid_certs());
        if let Some(timeout) = endpoint.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| TransportError::Request(error_chain(&e)))?;

        Ok(Self {
            http,
            accept_invalid_certs: endpoint.accept_invalid_certs(),
            chunk_size: BODY_CHUNK_SIZE,
        })
    }

    /// Sets the streaming slice size (for testing).
    #[cfg(test)]
    pub(crate) fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    async fn send(
        &self,
        request: UploadRequest,
        signals: mpsc::UnboundedSender<TransportSignal>,
    ) -> Result<HttpResponse, TransportError> {
        let UploadRequest { url, headers, body } = request;

        if self.accept_invalid_certs && url.starts_with("https://") {
            warn!(url = %url, "certificate validation disabled");
            let _ = signals.send(TransportSignal::TlsWarning(vec![format!(
                "certificate validation is disabled for {url}"
            )]));
        }

        let total = body.bytes.len();
        let mut builder = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, body.content_type)
            .header(CONTENT_LENGTH, total);
        for (name, value) in &headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| TransportError::InvalidHeader(name.clone()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| TransportError::InvalidHeader(name.to_string()))?;
            builder = builder.header(name, value);
        }

        let stream = body_stream(body.bytes, self.chunk_size, signals.clone());
        let resp = builder
            .body(reqwest::Body::wrap_stream(stream))
            .send()
            .await
            .map_err(|e| classify(&e, &signals))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED
            && let Some(scheme) = resp
                .headers()
                .get(WWW_AUTHENTICATE)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split_whitespace().next())
        {
            let _ = signals.send(TransportSignal::AuthChallenge {
                scheme: scheme.to_string(),
            });
        }

        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(
                    status = status.as_u16(),
                    error = %error_chain(&e),
                    "failed to read response body"
                );
                String::new()
            }
        };
        debug!(status = status.as_u16(), bytes = total, "upload request finished");

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}

impl HttpTransport for OctoPrintTransport {
    fn post(
        &self,
        request: UploadRequest,
        signals: mpsc::UnboundedSender<TransportSignal>,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send + '_>> {
        Box::pin(self.send(request, signals))
    }
}

/// Builds an [`UploadSession`] talking to `endpoint` over HTTP.
pub fn session(endpoint: Endpoint) -> Result<UploadSession, TransportError> {
    let transport = OctoPrintTransport::new(&endpoint)?;
    Ok(UploadSession::new(endpoint, Arc::new(transport)))
}

/// Streams `bytes` in slices, reporting each slice as sent.
fn body_stream(
    bytes: Vec<u8>,
    chunk_size: usize,
    signals: mpsc::UnboundedSender<TransportSignal>,
) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> + Send + 'static {
    let total = bytes.len() as u64;
    stream::unfold((bytes, 0usize), move |(bytes, offset)| {
        let signals = signals.clone();
        async move {
            if offset >= bytes.len() {
                return None;
            }
            let end = (offset + chunk_size).min(bytes.len());
            let chunk = bytes[offset..end].to_vec();
            let _ = signals.send(TransportSignal::UploadProgress {
                sent: end as u64,
                total,
            });
            Some((Ok::<_, std::io::Error>(chunk), (bytes, end)))
        }
    })
}

/// Maps a `reqwest` error to a transport error, signalling TLS failures.
fn classify(
    err: &reqwest::Error,
    signals: &mpsc::UnboundedSender<TransportSignal>,
) -> TransportError {
    let message = error_chain(err);
    if err.is_timeout() {
        return TransportError::Timeout;
    }
    if is_tls_failure(err) {
        let _ = signals.send(TransportSignal::TlsWarning(vec![message.clone()]));
        return TransportError::Tls(message);
    }
    if err.is_connect() {
        TransportError::Connect(message)
    } else {
        TransportError::Request(message)
    }
}

/// Whether a `rustls` error sits in the source chain of `err`.
fn is_tls_failure(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if cause.is::<rustls::Error>() {
            return true;
        }
        // `io::Error::source` skips the wrapped error itself.
        if let Some(io) = cause.downcast_ref::<std::io::Error>()
            && io.get_ref().is_some_and(|inner| inner.is::<rustls::Error>())
        {
            return true;
        }
        source = cause.source();
    }
    false
}

/// Joins an error and its sources into one line.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
