//! C-ABI wrapper around `httpq-core`.
//!
//! # Overview
//! Exposes the POST client through `extern "C"` functions that keep the
//! established `httpq_*` C interface, so existing C callers can relink without
//! source changes.
//!
//! # Design
//! - The C API is process-wide: there is one client, created by
//!   `httpq_init`. It lives in a `Mutex`, and every call holds the lock for
//!   its whole duration, so configuration and execution from different
//!   threads never interleave. Callers that want concurrent requests should
//!   use `httpq-core` directly with one client per thread.
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Calls before `httpq_init` return `FailedInit`; NULL or non-UTF-8
//!   strings return `BadFunctionArgument`.
//! - The response of `httpq_request_post` is owned by the caller and must be
//!   released with `httpq_free_response`.

pub mod types;

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_long};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};

use httpq_core::{ErrorCode, ExecuteOutcome, FormEntry, HttpqClient, RetryPolicy};

use types::*;

static CLIENT: Mutex<Option<HttpqClient>> = Mutex::new(None);

fn lock_client() -> MutexGuard<'static, Option<HttpqClient>> {
    CLIENT.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Run `f` against the initialized client and translate the result.
fn with_client(f: impl FnOnce(&mut HttpqClient) -> Result<(), ErrorCode>) -> c_long {
    catch_unwind(AssertUnwindSafe(|| {
        let mut guard = lock_client();
        match guard.as_mut() {
            Some(client) => result_code(f(client)),
            None => to_c(ErrorCode::FailedInit),
        }
    }))
    .unwrap_or(HTTPQ_ERR_INTERNAL)
}

/// Borrow a C string as UTF-8.
///
/// # Safety
/// `ptr` must be NULL or point to a NUL-terminated string that stays valid
/// for `'a`.
unsafe fn c_str<'a>(ptr: *const c_char) -> Result<&'a str, ErrorCode> {
    if ptr.is_null() {
        return Err(ErrorCode::BadFunctionArgument);
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| ErrorCode::BadFunctionArgument)
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Create the process-wide client. Calling it again is a no-op.
#[unsafe(no_mangle)]
pub extern "C" fn httpq_init() -> c_long {
    catch_unwind(|| {
        let mut guard = lock_client();
        if guard.is_none() {
            *guard = Some(HttpqClient::new());
            tracing::debug!("httpq client initialized");
        }
        to_c(ErrorCode::Ok)
    })
    .unwrap_or(HTTPQ_ERR_INTERNAL)
}

/// Drop the process-wide client and its connections. `httpq_init` may be
/// called again afterwards.
#[unsafe(no_mangle)]
pub extern "C" fn httpq_cleanup() {
    let _ = catch_unwind(|| {
        lock_client().take();
    });
}

/// Restore default limits and drop every pending setting.
#[unsafe(no_mangle)]
pub extern "C" fn httpq_reset() {
    let _ = catch_unwind(|| {
        if let Some(client) = lock_client().as_mut() {
            client.reset();
        }
    });
}

// ---------------------------------------------------------------------------
// Request configuration
// ---------------------------------------------------------------------------

/// Set the target URL. Kept across requests.
#[unsafe(no_mangle)]
pub extern "C" fn httpq_set_url(url: *const c_char) -> c_long {
    with_client(|client| {
        let url = unsafe { c_str(url) }?;
        client.set_url(url)
    })
}

/// Set a body that is sent verbatim. Kept across requests.
#[unsafe(no_mangle)]
pub extern "C" fn httpq_set_post(data: *const c_char) -> c_long {
    with_client(|client| {
        let data = unsafe { c_str(data) }?;
        client.set_raw_body(data);
        Ok(())
    })
}

/// Set a url-encoded body from a NULL-key-terminated pair array.
///
/// Values are percent-encoded, keys are not. At most 512 pairs.
#[unsafe(no_mangle)]
pub extern "C" fn httpq_set_key_post(pairs: *const HttpqKeyValue) -> c_long {
    with_client(|client| {
        if pairs.is_null() {
            return Err(ErrorCode::BadFunctionArgument);
        }
        let mut collected = Vec::new();
        let mut i = 0;
        loop {
            let pair = unsafe { &*pairs.add(i) };
            if pair.key.is_null() {
                break;
            }
            let key = unsafe { c_str(pair.key) }?;
            let value = unsafe { c_str(pair.value) }?;
            collected.push((key, value));
            i += 1;
        }
        client.set_key_value_body(&collected)
    })
}

/// Set a multipart body from a NULL-name-terminated field array.
///
/// Cleared after the next request. File fields with a NULL or empty path
/// are skipped. At most 512 fields.
#[unsafe(no_mangle)]
pub extern "C" fn httpq_set_key_http_post(fields: *const HttpqFormField) -> c_long {
    with_client(|client| {
        if fields.is_null() {
            return Err(ErrorCode::BadFunctionArgument);
        }
        let mut entries = Vec::new();
        let mut i = 0;
        loop {
            let field = unsafe { &*fields.add(i) };
            if field.name.is_null() {
                break;
            }
            let name = unsafe { c_str(field.name) }?;
            let entry = if field.is_file != 0 {
                let path = if field.value.is_null() {
                    ""
                } else {
                    unsafe { c_str(field.value) }?
                };
                FormEntry::file(name, path)
            } else {
                FormEntry::text(name, unsafe { c_str(field.value) }?)
            };
            entries.push(entry);
            i += 1;
        }
        client.set_multipart_body(&entries)
    })
}

/// Replace the header list with a NULL-terminated array of `"Name: value"`
/// strings. Cleared after the next request.
#[unsafe(no_mangle)]
pub extern "C" fn httpq_set_headers(headers: *const *const c_char) -> c_long {
    with_client(|client| {
        if headers.is_null() {
            return Err(ErrorCode::BadFunctionArgument);
        }
        let mut lines = Vec::new();
        let mut i = 0;
        loop {
            let line = unsafe { *headers.add(i) };
            if line.is_null() {
                break;
            }
            lines.push(unsafe { c_str(line) }?);
            i += 1;
        }
        client.set_headers(lines);
        Ok(())
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn httpq_set_username(user_name: *const c_char) -> c_long {
    with_client(|client| {
        client.set_username(unsafe { c_str(user_name) }?);
        Ok(())
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn httpq_set_userpwd(user_pwd: *const c_char) -> c_long {
    with_client(|client| {
        client.set_password(unsafe { c_str(user_pwd) }?);
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// Session settings
// ---------------------------------------------------------------------------

/// Set the response size ceiling in bytes (default 4 MiB). Negative values
/// count as 0.
#[unsafe(no_mangle)]
pub extern "C" fn httpq_set_limit_resp(resp_limit: c_long) -> c_long {
    with_client(|client| {
        client.set_response_limit(usize::try_from(resp_limit).unwrap_or(0));
        Ok(())
    })
}

/// Set the request timeout in seconds (default 20). 0 or a negative value
/// disables the timeout.
#[unsafe(no_mangle)]
pub extern "C" fn httpq_set_max_time(max_time: c_long) -> c_long {
    with_client(|client| {
        client.set_timeout(u64::try_from(max_time).unwrap_or(0));
        Ok(())
    })
}

/// Select `HTTPQ_NO_RETRY` or `HTTPQ_RETRY_ON_TIMEOUT` (default).
#[unsafe(no_mangle)]
pub extern "C" fn httpq_set_retry(retry_policy: c_int) -> c_long {
    with_client(|client| {
        let policy = match retry_policy {
            HTTPQ_NO_RETRY => RetryPolicy::NoRetry,
            HTTPQ_RETRY_ON_TIMEOUT => RetryPolicy::RetryOnTimeout,
            _ => return Err(ErrorCode::BadFunctionArgument),
        };
        client.set_retry_policy(policy);
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Perform the configured POST.
///
/// Writes the error code to `error_code` and the HTTP status to `http_code`
/// (0 on failure); either pointer may be NULL. Returns the response body as
/// a NUL-terminated string, or NULL on failure. A body containing NUL bytes
/// is cut at the first one. Free the result with `httpq_free_response`.
#[unsafe(no_mangle)]
pub extern "C" fn httpq_request_post(error_code: *mut c_long, http_code: *mut c_long) -> *mut c_char {
    let (code, status, body) = catch_unwind(|| {
        let mut guard = lock_client();
        let Some(client) = guard.as_mut() else {
            return (to_c(ErrorCode::FailedInit), 0, std::ptr::null_mut());
        };
        let outcome = ExecuteOutcome::from(client.execute_post());
        let body = match &outcome.body {
            Some(body) if outcome.code.is_ok() => {
                CStr::from_bytes_until_nul(body.as_bytes_with_nul())
                    .map(CStr::to_owned)
                    .unwrap_or_default()
                    .into_raw()
            }
            _ => std::ptr::null_mut(),
        };
        (to_c(outcome.code), c_long::from(outcome.status), body)
    })
    .unwrap_or((HTTPQ_ERR_INTERNAL, 0, std::ptr::null_mut()));

    if !error_code.is_null() {
        unsafe { *error_code = code };
    }
    if !http_code.is_null() {
        unsafe { *http_code = status };
    }
    body
}

/// Free a body returned by `httpq_request_post`. Safe to call with NULL.
#[unsafe(no_mangle)]
pub extern "C" fn httpq_free_response(response: *mut c_char) {
    if !response.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { CString::from_raw(response) });
        });
    }
}

/// Describe an error code. The returned string is static.
#[unsafe(no_mangle)]
pub extern "C" fn httpq_error(error_code: c_long) -> *const c_char {
    error_cstr(error_code).as_ptr()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use httpq_core::Body;

    static TEST_LOCK: Mutex<()> = Mutex::new(());

    /// Serialize tests over the shared client and start each from a fresh one.
    fn fresh() -> MutexGuard<'static, ()> {
        let guard = TEST_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        httpq_cleanup();
        assert_eq!(httpq_init(), 0);
        guard
    }

    fn inspect<R>(f: impl FnOnce(&HttpqClient) -> R) -> R {
        f(lock_client().as_ref().unwrap())
    }

    #[test]
    fn calls_before_init_fail() {
        let _guard = TEST_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        httpq_cleanup();
        let url = CString::new("http://localhost").unwrap();
        assert_eq!(httpq_set_url(url.as_ptr()), 2);

        let mut err = 0;
        let mut status = 99;
        let body = httpq_request_post(&mut err, &mut status);
        assert!(body.is_null());
        assert_eq!(err, 2);
        assert_eq!(status, 0);
    }

    #[test]
    fn init_is_idempotent() {
        let _guard = fresh();
        httpq_set_max_time(3);
        assert_eq!(httpq_init(), 0);
        inspect(|c| assert_eq!(c.session().timeout_secs, 3));
    }

    #[test]
    fn null_arguments_are_rejected() {
        let _guard = fresh();
        assert_eq!(httpq_set_url(std::ptr::null()), 43);
        assert_eq!(httpq_set_post(std::ptr::null()), 43);
        assert_eq!(httpq_set_key_post(std::ptr::null()), 43);
        assert_eq!(httpq_set_key_http_post(std::ptr::null()), 43);
        assert_eq!(httpq_set_headers(std::ptr::null()), 43);
        assert_eq!(httpq_set_username(std::ptr::null()), 43);
        assert_eq!(httpq_set_userpwd(std::ptr::null()), 43);
    }

    #[test]
    fn key_post_encodes_values() {
        let _guard = fresh();
        let (a, xy, b, amp) = (
            CString::new("a").unwrap(),
            CString::new("x y").unwrap(),
            CString::new("b").unwrap(),
            CString::new("1&2").unwrap(),
        );
        let pairs = [
            HttpqKeyValue { key: a.as_ptr(), value: xy.as_ptr() },
            HttpqKeyValue { key: b.as_ptr(), value: amp.as_ptr() },
            HttpqKeyValue { key: std::ptr::null(), value: std::ptr::null() },
        ];
        assert_eq!(httpq_set_key_post(pairs.as_ptr()), 0);
        inspect(|c| {
            assert_eq!(
                c.pending().body(),
                Some(&Body::Encoded("a=x+y&b=1%262&".to_string()))
            );
        });
    }

    #[test]
    fn oversized_multipart_keeps_previous_form() {
        let _guard = fresh();
        let name = CString::new("sender").unwrap();
        let value = CString::new("John").unwrap();
        let terminator = HttpqFormField {
            name: std::ptr::null(),
            value: std::ptr::null(),
            is_file: 0,
        };
        let one = [
            HttpqFormField { name: name.as_ptr(), value: value.as_ptr(), is_file: 0 },
            terminator,
        ];
        assert_eq!(httpq_set_key_http_post(one.as_ptr()), 0);
        let before = inspect(|c| c.pending().body().cloned());
        assert!(before.as_ref().is_some_and(Body::is_multipart));

        let mut many: Vec<HttpqFormField> = (0..513)
            .map(|_| HttpqFormField { name: name.as_ptr(), value: value.as_ptr(), is_file: 0 })
            .collect();
        many.push(terminator);
        assert_eq!(httpq_set_key_http_post(many.as_ptr()), 43);
        assert_eq!(inspect(|c| c.pending().body().cloned()), before);
    }

    #[test]
    fn file_field_without_path_is_skipped() {
        let _guard = fresh();
        let name = CString::new("pic").unwrap();
        let fields = [
            HttpqFormField { name: name.as_ptr(), value: std::ptr::null(), is_file: 1 },
            HttpqFormField { name: std::ptr::null(), value: std::ptr::null(), is_file: 0 },
        ];
        assert_eq!(httpq_set_key_http_post(fields.as_ptr()), 0);
        inspect(|c| match c.pending().body() {
            Some(Body::Multipart(form)) => assert!(form.is_empty()),
            other => panic!("unexpected body: {other:?}"),
        });
    }

    #[test]
    fn headers_are_replaced() {
        let _guard = fresh();
        let first = CString::new("X-One: 1").unwrap();
        let second = CString::new("X-Two: 2").unwrap();
        let list = [first.as_ptr(), second.as_ptr(), std::ptr::null()];
        assert_eq!(httpq_set_headers(list.as_ptr()), 0);
        let list = [second.as_ptr(), std::ptr::null()];
        assert_eq!(httpq_set_headers(list.as_ptr()), 0);
        inspect(|c| assert_eq!(c.pending().headers(), ["X-Two: 2".to_string()]));
    }

    #[test]
    fn reset_restores_defaults() {
        let _guard = fresh();
        assert_eq!(httpq_set_max_time(5), 0);
        assert_eq!(httpq_set_retry(HTTPQ_NO_RETRY), 0);
        assert_eq!(httpq_set_limit_resp(-1), 0);
        inspect(|c| assert_eq!(c.session().response_limit, 0));

        httpq_reset();
        inspect(|c| {
            assert_eq!(c.session().timeout_secs, 20);
            assert_eq!(c.session().retry_policy, RetryPolicy::RetryOnTimeout);
            assert_eq!(c.session().response_limit, 4 * 1024 * 1024);
        });
    }

    #[test]
    fn unknown_retry_policy_is_rejected() {
        let _guard = fresh();
        assert_eq!(httpq_set_retry(7), 43);
    }

    #[test]
    fn post_without_url_reports_malformed_url() {
        let _guard = fresh();
        let mut err = 0;
        let mut status = 99;
        let body = httpq_request_post(&mut err, &mut status);
        assert!(body.is_null());
        assert_eq!(err, 3);
        assert_eq!(status, 0);
        httpq_free_response(body);
    }

    #[test]
    fn error_strings_match_core_descriptions() {
        for raw in 0..100 {
            if let Some(code) = ErrorCode::from_code(raw) {
                let text = unsafe { CStr::from_ptr(httpq_error(raw as c_long)) };
                assert_eq!(text.to_str().unwrap(), code.describe());
            }
        }
        let unknown = unsafe { CStr::from_ptr(httpq_error(4)) };
        assert_eq!(unknown.to_str().unwrap(), "Unknown error");
    }

    #[test]
    fn error_strings_are_stable_and_cover_internal_errors() {
        assert_eq!(httpq_error(28), httpq_error(28));
        let internal = unsafe { CStr::from_ptr(httpq_error(HTTPQ_ERR_INTERNAL)) };
        assert_eq!(internal.to_str().unwrap(), "Internal library error");
    }

    #[test]
    fn free_response_null_is_safe() {
        httpq_free_response(std::ptr::null_mut());
    }
}
