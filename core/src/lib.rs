//! Single-request HTTP(S) POST client.
//!
//! # Overview
//! A client accumulates the configuration of one outbound POST (URL, body,
//! headers, credentials) on top of session-wide limits (response size
//! ceiling, timeout, retry policy), then executes it synchronously and
//! returns the status and body or an error code.
//!
//! # Design
//! - `HttpqClient` is instance-scoped: it owns the transport, the session
//!   settings and the pending request. No global state.
//! - The network engine sits behind the `Transport` trait; `UreqTransport`
//!   is the production implementation.
//! - Response bodies are collected by `ResponseBuffer`, which grows in
//!   explicit steps and rejects data beyond the configured limit.
//! - Errors are `ErrorCode` values with libcurl-compatible numbering so the
//!   C wrapper can pass them through unchanged.

pub mod body;
pub mod buffer;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod transport;

pub use body::{Body, FormEntry, MultipartForm};
pub use buffer::{ResponseBody, ResponseBuffer};
pub use client::{ExecuteOutcome, HttpqClient, PendingRequest, PostResponse};
pub use config::{RetryPolicy, SessionConfig};
pub use error::{ErrorCode, TransportError};
pub use http::{HttpRequest, RequestPayload, Transport};
pub use transport::UreqTransport;
