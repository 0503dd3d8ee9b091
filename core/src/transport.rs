//! `Transport` implementation backed by a `ureq` agent.
//!
//! # Design
//! The agent is created once and kept for the lifetime of the transport so
//! its connection pool is reused across requests. A fresh-connection attempt
//! replaces the agent, which drops every pooled connection. Status codes are
//! returned as data (`http_status_as_error(false)`); interpreting them is the
//! caller's business. Redirects are not followed, so a 3xx answer to the
//! POST is what the caller sees.

use std::io::Read;

use crate::error::{ErrorCode, TransportError};
use crate::http::{HttpRequest, Transport};

const READ_CHUNK: usize = 16 * 1024;

/// Blocking HTTP(S) engine.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl UreqTransport {
    pub fn new() -> Self {
        Self {
            agent: make_agent(),
        }
    }

    fn send(
        &self,
        request: &HttpRequest<'_>,
    ) -> Result<ureq::http::Response<ureq::Body>, TransportError> {
        check_scheme(request.url)?;

        let mut builder = ureq::http::Request::builder()
            .method("POST")
            .uri(request.url);
        let headers = request.caller_headers();
        if let Some(payload) = &request.payload {
            if !headers.overrides("content-type") {
                builder = builder.header("content-type", payload.content_type.as_str());
            }
        }
        if let Some(auth) = request.basic_auth() {
            if !headers.overrides("authorization") {
                builder = builder.header("authorization", auth);
            }
        }
        for (name, value) in &headers.pairs {
            builder = builder.header(*name, *value);
        }

        let data = request
            .payload
            .as_ref()
            .map(|p| p.data.clone())
            .unwrap_or_default();
        let http_request = builder
            .body(data)
            .map_err(|err| TransportError::new(ErrorCode::UrlMalformat, err.to_string()))?;

        let configured = self
            .agent
            .configure_request(http_request)
            .timeout_global(request.timeout)
            .build();

        self.agent.run(configured).map_err(classify_ureq_error)
    }
}

impl Transport for UreqTransport {
    fn perform(
        &mut self,
        request: &HttpRequest<'_>,
        sink: &mut dyn FnMut(&[u8]) -> usize,
    ) -> Result<u16, TransportError> {
        if request.fresh_connection {
            self.agent = make_agent();
        }

        let mut response = self.send(request)?;
        let status = response.status().as_u16();

        let mut reader = response.body_mut().as_reader();
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            let read = reader.read(&mut chunk).map_err(classify_read_error)?;
            if read == 0 {
                break;
            }
            let written = sink(&chunk[..read]);
            if written < read {
                return Err(TransportError::new(
                    ErrorCode::WriteError,
                    format!("failure writing output: accepted {written} of {read} bytes"),
                ));
            }
        }

        Ok(status)
    }

    fn reset(&mut self) {
        self.agent = make_agent();
    }
}

fn make_agent() -> ureq::Agent {
    ureq::Agent::config_builder()
        .http_status_as_error(false)
        .max_redirects(0)
        .build()
        .new_agent()
}

fn check_scheme(url: &str) -> Result<(), TransportError> {
    let Some((scheme, rest)) = url.split_once("://") else {
        return Err(TransportError::new(
            ErrorCode::UrlMalformat,
            format!("no scheme in URL: {url}"),
        ));
    };
    if rest.is_empty() {
        return Err(TransportError::new(
            ErrorCode::UrlMalformat,
            format!("no host in URL: {url}"),
        ));
    }
    if scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https") {
        Ok(())
    } else {
        Err(TransportError::new(
            ErrorCode::UnsupportedProtocol,
            format!("protocol \"{scheme}\" not supported"),
        ))
    }
}

fn classify_ureq_error(error: ureq::Error) -> TransportError {
    let code = match &error {
        ureq::Error::Timeout(_) => ErrorCode::OperationTimedOut,
        ureq::Error::HostNotFound => ErrorCode::CouldntResolveHost,
        ureq::Error::ConnectionFailed => ErrorCode::CouldntConnect,
        ureq::Error::ConnectProxyFailed(_) | ureq::Error::InvalidProxyUrl => {
            ErrorCode::CouldntResolveProxy
        }
        ureq::Error::BadUri(_) | ureq::Error::Http(_) => ErrorCode::UrlMalformat,
        ureq::Error::TooManyRedirects | ureq::Error::RedirectFailed => {
            ErrorCode::TooManyRedirects
        }
        ureq::Error::Protocol(_) => ErrorCode::WeirdServerReply,
        ureq::Error::Tls(_) => ErrorCode::SslConnectError,
        ureq::Error::Io(source) => io_error_code(source),
        _ => ErrorCode::RecvError,
    };
    TransportError::new(code, error.to_string())
}

fn classify_read_error(error: std::io::Error) -> TransportError {
    let wrapped = error
        .get_ref()
        .and_then(|source| source.downcast_ref::<ureq::Error>());
    let code = match wrapped {
        Some(ureq::Error::Timeout(_)) => ErrorCode::OperationTimedOut,
        Some(_) => ErrorCode::RecvError,
        None => io_error_code(&error),
    };
    TransportError::new(code, error.to_string())
}

fn io_error_code(error: &std::io::Error) -> ErrorCode {
    use std::io::ErrorKind;
    match error.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => ErrorCode::OperationTimedOut,
        ErrorKind::NotFound => ErrorCode::CouldntResolveHost,
        ErrorKind::ConnectionRefused
        | ErrorKind::ConnectionAborted
        | ErrorKind::NotConnected
        | ErrorKind::AddrNotAvailable => ErrorCode::CouldntConnect,
        ErrorKind::BrokenPipe => ErrorCode::SendError,
        ErrorKind::UnexpectedEof => ErrorCode::GotNothing,
        _ => ErrorCode::RecvError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_check_accepts_http_and_https() {
        assert!(check_scheme("http://localhost").is_ok());
        assert!(check_scheme("HTTPS://example.com/x").is_ok());
    }

    #[test]
    fn scheme_check_rejects_other_protocols() {
        let err = check_scheme("ftp://example.com").unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedProtocol);
    }

    #[test]
    fn scheme_check_rejects_malformed_urls() {
        assert_eq!(check_scheme("localhost:3000").unwrap_err().code, ErrorCode::UrlMalformat);
        assert_eq!(check_scheme("http://").unwrap_err().code, ErrorCode::UrlMalformat);
    }

    #[test]
    fn io_kinds_map_to_transfer_codes() {
        let refused = std::io::Error::from(std::io::ErrorKind::ConnectionRefused);
        assert_eq!(io_error_code(&refused), ErrorCode::CouldntConnect);
        let timed_out = std::io::Error::from(std::io::ErrorKind::TimedOut);
        assert_eq!(io_error_code(&timed_out), ErrorCode::OperationTimedOut);
        assert_eq!(
            classify_read_error(std::io::Error::from(std::io::ErrorKind::ConnectionReset)).code,
            ErrorCode::RecvError
        );
    }

    #[test]
    fn ureq_errors_are_classified() {
        assert_eq!(
            classify_ureq_error(ureq::Error::HostNotFound).code,
            ErrorCode::CouldntResolveHost
        );
        assert_eq!(
            classify_ureq_error(ureq::Error::ConnectionFailed).code,
            ErrorCode::CouldntConnect
        );
    }
}
