//! Transport seam: what one attempt looks like as plain data.
//!
//! # Design
//! The executor never talks to an HTTP engine directly. It builds an
//! `HttpRequest` for every attempt and hands it to a `Transport` together
//! with a sink that receives the response body chunk by chunk. The sink
//! returns how many bytes it consumed; anything short of the full chunk must
//! abort the transfer with a write error. This keeps the executor testable
//! with a scripted transport and lets the real engine be swapped.

use std::time::Duration;

use base64::Engine;

use crate::error::TransportError;

/// Body bytes plus the content type they are sent with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPayload {
    pub content_type: String,
    pub data: Vec<u8>,
}

/// One POST attempt described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest<'a> {
    pub url: &'a str,
    pub payload: Option<RequestPayload>,
    /// Raw `Name: value` header lines as supplied by the caller.
    pub headers: &'a [String],
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
    /// `None` means no timeout.
    pub timeout: Option<Duration>,
    /// Do not reuse a pooled connection for this attempt.
    pub fresh_connection: bool,
}

/// Caller header lines split once per attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerHeaders<'a> {
    /// Headers to send, in caller order.
    pub pairs: Vec<(&'a str, &'a str)>,
    /// Names given as `Name:` with nothing after the colon.
    pub suppressed: Vec<&'a str>,
}

impl CallerHeaders<'_> {
    /// Whether the caller set or suppressed `name`. Either way a default
    /// value for it must not be added.
    pub fn overrides(&self, name: &str) -> bool {
        self.pairs.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
            || self.suppressed.iter().any(|n| n.eq_ignore_ascii_case(name))
    }
}

impl<'a> HttpRequest<'a> {
    /// Parse the raw header lines.
    ///
    /// `Name:` suppresses the header of that name; the client then adds no
    /// default `Content-Type` or `Authorization` of its own. Headers the HTTP
    /// engine adds by itself (`User-Agent`, `Accept`) are still sent. Lines
    /// without a colon or a name are dropped with a warning.
    pub fn caller_headers(&self) -> CallerHeaders<'a> {
        let mut parsed = CallerHeaders::default();
        for line in self.headers {
            match split_header(line) {
                Some((name, "")) => parsed.suppressed.push(name),
                Some(pair) => parsed.pairs.push(pair),
                None => tracing::warn!(header = %line, "skipping malformed header line"),
            }
        }
        parsed
    }

    /// `Authorization` value for basic credentials, if any were set.
    pub fn basic_auth(&self) -> Option<String> {
        if self.username.is_none() && self.password.is_none() {
            return None;
        }
        let user = self.username.unwrap_or_default();
        let password = self.password.unwrap_or_default();
        let token = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{password}"));
        Some(format!("Basic {token}"))
    }
}

fn split_header(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once(':')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name, value.trim()))
}

/// The HTTP engine performing the network exchange.
pub trait Transport {
    /// Perform one attempt, streaming the body into `sink`.
    ///
    /// Returns the HTTP status code on success. When `sink` consumes fewer
    /// bytes than offered the attempt fails with `ErrorCode::WriteError`.
    fn perform(
        &mut self,
        request: &HttpRequest<'_>,
        sink: &mut dyn FnMut(&[u8]) -> usize,
    ) -> Result<u16, TransportError>;

    /// Drop all per-request option state and pooled connections.
    fn reset(&mut self);
}
