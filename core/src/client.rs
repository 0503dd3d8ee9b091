//! Session state, pending request and the POST executor.
//!
//! # Design
//! `HttpqClient` owns everything one logical client needs: the transport
//! (and with it the connection pool), the session settings and the pending
//! request. There is no global state; callers that need concurrency create
//! one client per thread or put a single client behind a mutex. Every
//! operation takes `&mut self`, so configure-then-execute cannot interleave
//! on one instance.
//!
//! # Persistence of settings
//! Not every setting lives equally long:
//!
//! | setting                         | lifetime                              |
//! |---------------------------------|---------------------------------------|
//! | response limit, timeout, retry  | until `reset`                         |
//! | url, username, password         | until replaced or `reset`             |
//! | raw and key-value bodies        | until replaced or `reset`             |
//! | headers, multipart body         | one execution, then cleared           |
//!
//! A caller may post the same form to the same URL repeatedly, but has to
//! restate headers and uploads for every request.

use crate::body::{encode_key_values, Body, FormEntry, MultipartForm, FORM_URLENCODED};
use crate::buffer::{ResponseBody, ResponseBuffer};
use crate::config::{RetryPolicy, SessionConfig};
use crate::error::{ErrorCode, TransportError};
use crate::http::{HttpRequest, RequestPayload, Transport};
use crate::transport::UreqTransport;

/// Configuration accumulated for the next execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingRequest {
    url: Option<String>,
    body: Option<Body>,
    headers: Vec<String>,
    username: Option<String>,
    password: Option<String>,
}

impl PendingRequest {
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Drop the settings that only apply to one execution.
    fn clear_one_shot(&mut self) {
        self.headers.clear();
        if self.body.as_ref().is_some_and(Body::is_multipart) {
            self.body = None;
        }
    }

    fn payload(&self) -> Result<Option<RequestPayload>, ErrorCode> {
        let payload = match &self.body {
            None => return Ok(None),
            Some(Body::Raw(text)) | Some(Body::Encoded(text)) => RequestPayload {
                content_type: FORM_URLENCODED.to_string(),
                data: text.as_bytes().to_vec(),
            },
            Some(Body::Multipart(form)) => {
                let encoded = form.encode()?;
                RequestPayload {
                    content_type: encoded.content_type,
                    data: encoded.data,
                }
            }
        };
        Ok(Some(payload))
    }
}

/// A successful POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostResponse {
    pub status: u16,
    pub body: ResponseBody,
}

/// Flattened view of an execution: code, status (0 on failure) and body
/// (present only on success).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteOutcome {
    pub code: ErrorCode,
    pub status: u16,
    pub body: Option<ResponseBody>,
}

impl From<Result<PostResponse, ErrorCode>> for ExecuteOutcome {
    fn from(result: Result<PostResponse, ErrorCode>) -> Self {
        match result {
            Ok(response) => Self {
                code: ErrorCode::Ok,
                status: response.status,
                body: Some(response.body),
            },
            Err(code) => Self {
                code,
                status: 0,
                body: None,
            },
        }
    }
}

/// Single-request POST client.
///
/// Not meant to be shared between threads without external locking.
pub struct HttpqClient<T: Transport = UreqTransport> {
    transport: T,
    session: SessionConfig,
    pending: PendingRequest,
    fresh_connection: bool,
}

impl HttpqClient<UreqTransport> {
    /// Client with default session settings over a fresh `ureq` agent.
    pub fn new() -> Self {
        Self::with_transport(UreqTransport::new())
    }
}

impl Default for HttpqClient<UreqTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> HttpqClient<T> {
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            session: SessionConfig::default(),
            pending: PendingRequest::default(),
            fresh_connection: false,
        }
    }

    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    pub fn pending(&self) -> &PendingRequest {
        &self.pending
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn set_url(&mut self, url: &str) -> Result<(), ErrorCode> {
        if url.is_empty() {
            return Err(ErrorCode::INVALID_ARGUMENT);
        }
        self.pending.url = Some(url.to_string());
        Ok(())
    }

    /// Body sent verbatim.
    pub fn set_raw_body(&mut self, text: impl Into<String>) {
        self.pending.body = Some(Body::Raw(text.into()));
    }

    /// `key=value&...` body with percent-encoded values.
    ///
    /// On error the previous body is kept.
    pub fn set_key_value_body<K, V>(&mut self, pairs: &[(K, V)]) -> Result<(), ErrorCode>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let encoded = encode_key_values(pairs)?;
        self.pending.body = Some(Body::Encoded(encoded));
        Ok(())
    }

    /// `multipart/form-data` body, cleared after the next execution.
    ///
    /// On error the previous body is kept.
    pub fn set_multipart_body(&mut self, entries: &[FormEntry]) -> Result<(), ErrorCode> {
        let form = MultipartForm::from_entries(entries)?;
        self.pending.body = Some(Body::Multipart(form));
        Ok(())
    }

    /// Replace the header list. Lines use the `Name: value` form.
    ///
    /// `Name:` with no value stops the client from adding its own
    /// `Content-Type` or `Authorization`. It cannot remove the `User-Agent`
    /// and `Accept` headers the HTTP engine always sends.
    pub fn set_headers<I, S>(&mut self, headers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pending.headers = headers.into_iter().map(Into::into).collect();
    }

    pub fn set_username(&mut self, name: impl Into<String>) {
        self.pending.username = Some(name.into());
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.pending.password = Some(password.into());
    }

    pub fn set_response_limit(&mut self, bytes: usize) {
        self.session.response_limit = bytes;
    }

    /// Per-attempt timeout in seconds; 0 disables it.
    pub fn set_timeout(&mut self, seconds: u64) {
        self.session.timeout_secs = seconds;
    }

    pub fn set_retry_policy(&mut self, policy: RetryPolicy) {
        self.session.retry_policy = policy;
    }

    pub fn set_session_config(&mut self, config: SessionConfig) {
        self.session = config;
    }

    /// Restore session defaults and drop everything pending.
    pub fn reset(&mut self) {
        self.session = SessionConfig::default();
        self.pending = PendingRequest::default();
        self.fresh_connection = false;
        self.transport.reset();
    }

    /// Perform the configured POST.
    ///
    /// A timed-out attempt is retried once on a fresh connection when the
    /// retry policy allows it. Headers and a multipart body are cleared
    /// afterwards whatever the outcome.
    pub fn execute_post(&mut self) -> Result<PostResponse, ErrorCode> {
        let result = self.run();
        self.pending.clear_one_shot();
        if let Err(code) = &result {
            tracing::debug!(code = code.code(), error = %code, "POST failed");
        }
        result
    }

    fn run(&mut self) -> Result<PostResponse, ErrorCode> {
        let Some(url) = self.pending.url.as_deref() else {
            return Err(ErrorCode::UrlMalformat);
        };
        let payload = self.pending.payload()?;

        let mut request = HttpRequest {
            url,
            payload,
            headers: &self.pending.headers,
            username: self.pending.username.as_deref(),
            password: self.pending.password.as_deref(),
            timeout: self.session.timeout(),
            fresh_connection: self.fresh_connection,
        };
        let limit = self.session.response_limit;

        let mut result = attempt(&mut self.transport, &request, limit);
        let timed_out = matches!(&result, Err(err) if err.code.is_timeout());
        // A timed-out connection is never handed back to the pool; the flag
        // also covers the next execution when no retry happens here.
        self.fresh_connection = timed_out;
        if timed_out && self.session.retry_policy == RetryPolicy::RetryOnTimeout {
            tracing::warn!(url, "POST timed out, retrying on a fresh connection");
            request.fresh_connection = true;
            result = attempt(&mut self.transport, &request, limit);
            self.fresh_connection = matches!(&result, Err(err) if err.code.is_timeout());
        }

        match result {
            Ok((status, body)) => {
                tracing::debug!(url, status, bytes = body.len(), "POST completed");
                Ok(PostResponse { status, body })
            }
            Err(err) => {
                tracing::debug!(url, error = %err, "POST attempt failed");
                Err(err.code)
            }
        }
    }
}

/// One transport call into a new response buffer.
fn attempt<T: Transport>(
    transport: &mut T,
    request: &HttpRequest<'_>,
    limit: usize,
) -> Result<(u16, ResponseBody), TransportError> {
    tracing::debug!(
        url = request.url,
        fresh = request.fresh_connection,
        timeout = ?request.timeout,
        "performing POST"
    );
    let mut buffer = ResponseBuffer::new(limit);
    let status = transport.perform(request, &mut |chunk| buffer.write_chunk(chunk))?;
    Ok((status, buffer.finish()))
}
