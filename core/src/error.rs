//! Error codes for the POST client.
//!
//! # Design
//! Every fallible operation reports an `ErrorCode`. The numeric values follow
//! the classic libcurl easy-interface numbering so that C callers which used
//! to compare against `CURLE_*` constants keep working, but the enumeration is
//! owned here and no longer tied to any one HTTP engine.
//!
//! The core contract talks about a handful of categories (invalid argument,
//! encoding overflow, response too large, timeout); those are associated
//! constants aliasing the concrete codes.

use std::fmt;

use thiserror::Error;

/// Result code of a configuration call or a request execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Ok,
    UnsupportedProtocol,
    FailedInit,
    UrlMalformat,
    CouldntResolveProxy,
    CouldntResolveHost,
    CouldntConnect,
    WeirdServerReply,
    WriteError,
    ReadError,
    OutOfMemory,
    OperationTimedOut,
    HttpPostError,
    SslConnectError,
    FileCouldntReadFile,
    BadFunctionArgument,
    TooManyRedirects,
    GotNothing,
    SendError,
    RecvError,
    PeerFailedVerification,
}

impl ErrorCode {
    /// A setter received an absent or malformed argument.
    pub const INVALID_ARGUMENT: ErrorCode = ErrorCode::BadFunctionArgument;
    /// The key-value body could not be assembled.
    pub const ENCODING_OVERFLOW: ErrorCode = ErrorCode::HttpPostError;
    /// The response exceeded the configured limit.
    pub const RESPONSE_TOO_LARGE: ErrorCode = ErrorCode::WriteError;
    /// The transfer did not finish within the configured timeout.
    pub const TIMEOUT: ErrorCode = ErrorCode::OperationTimedOut;

    pub const ALL: [ErrorCode; 21] = [
        ErrorCode::Ok,
        ErrorCode::UnsupportedProtocol,
        ErrorCode::FailedInit,
        ErrorCode::UrlMalformat,
        ErrorCode::CouldntResolveProxy,
        ErrorCode::CouldntResolveHost,
        ErrorCode::CouldntConnect,
        ErrorCode::WeirdServerReply,
        ErrorCode::WriteError,
        ErrorCode::ReadError,
        ErrorCode::OutOfMemory,
        ErrorCode::OperationTimedOut,
        ErrorCode::HttpPostError,
        ErrorCode::SslConnectError,
        ErrorCode::FileCouldntReadFile,
        ErrorCode::BadFunctionArgument,
        ErrorCode::TooManyRedirects,
        ErrorCode::GotNothing,
        ErrorCode::SendError,
        ErrorCode::RecvError,
        ErrorCode::PeerFailedVerification,
    ];

    /// Stable numeric value, as seen through the C interface.
    pub const fn code(self) -> i64 {
        match self {
            ErrorCode::Ok => 0,
            ErrorCode::UnsupportedProtocol => 1,
            ErrorCode::FailedInit => 2,
            ErrorCode::UrlMalformat => 3,
            ErrorCode::CouldntResolveProxy => 5,
            ErrorCode::CouldntResolveHost => 6,
            ErrorCode::CouldntConnect => 7,
            ErrorCode::WeirdServerReply => 8,
            ErrorCode::WriteError => 23,
            ErrorCode::ReadError => 26,
            ErrorCode::OutOfMemory => 27,
            ErrorCode::OperationTimedOut => 28,
            ErrorCode::HttpPostError => 34,
            ErrorCode::SslConnectError => 35,
            ErrorCode::FileCouldntReadFile => 37,
            ErrorCode::BadFunctionArgument => 43,
            ErrorCode::TooManyRedirects => 47,
            ErrorCode::GotNothing => 52,
            ErrorCode::SendError => 55,
            ErrorCode::RecvError => 56,
            ErrorCode::PeerFailedVerification => 60,
        }
    }

    /// Inverse of [`ErrorCode::code`]. Unknown values yield `None`.
    pub fn from_code(code: i64) -> Option<ErrorCode> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    /// Human-readable description of the code.
    pub fn describe(self) -> &'static str {
        match self {
            ErrorCode::Ok => "No error",
            ErrorCode::UnsupportedProtocol => "Unsupported protocol",
            ErrorCode::FailedInit => "Failed initialization",
            ErrorCode::UrlMalformat => "URL using bad/illegal format or missing URL",
            ErrorCode::CouldntResolveProxy => "Couldn't resolve proxy name",
            ErrorCode::CouldntResolveHost => "Couldn't resolve host name",
            ErrorCode::CouldntConnect => "Couldn't connect to server",
            ErrorCode::WeirdServerReply => "Weird server reply",
            ErrorCode::WriteError => "Failed writing received data to disk/application",
            ErrorCode::ReadError => "Failed reading the response body",
            ErrorCode::OutOfMemory => "Out of memory",
            ErrorCode::OperationTimedOut => "Timeout was reached",
            ErrorCode::HttpPostError => "Internal problem setting up the POST",
            ErrorCode::SslConnectError => "SSL connect error",
            ErrorCode::FileCouldntReadFile => "Couldn't read a file:// file",
            ErrorCode::BadFunctionArgument => "A libcurl function was given a bad argument",
            ErrorCode::TooManyRedirects => "Number of redirects hit maximum amount",
            ErrorCode::GotNothing => "Server returned nothing (no headers, no data)",
            ErrorCode::SendError => "Failed sending data to the peer",
            ErrorCode::RecvError => "Failure when receiving data from the peer",
            ErrorCode::PeerFailedVerification => {
                "SSL peer certificate or SSH remote key was not OK"
            }
        }
    }

    pub fn is_ok(self) -> bool {
        self == ErrorCode::Ok
    }

    /// Only timeouts take the retry branch of the executor.
    pub fn is_timeout(self) -> bool {
        self == ErrorCode::OperationTimedOut
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

impl std::error::Error for ErrorCode {}

/// Failure reported by a [`Transport`](crate::http::Transport) for one attempt.
///
/// `message` keeps the engine's own wording for logs; callers only ever see
/// `code`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct TransportError {
    pub code: ErrorCode,
    pub message: String,
}

impl TransportError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<ErrorCode> for TransportError {
    fn from(code: ErrorCode) -> Self {
        Self::new(code, code.describe())
    }
}
