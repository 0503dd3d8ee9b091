//! `#[repr(C)]` types and constants for the FFI boundary.
//!
//! # Design
//! Arrays cross the boundary as pointers to terminator-ended element lists,
//! the way the C API has always taken them: a key/value array ends with an
//! element whose `key` is NULL, a form array with one whose `name` is NULL.

use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_long};
use std::sync::OnceLock;

use httpq_core::ErrorCode;

/// Pass to `httpq_set_retry` to report timeouts as final.
pub const HTTPQ_NO_RETRY: c_int = 0;
/// Pass to `httpq_set_retry` to retry a timed-out request once.
pub const HTTPQ_RETRY_ON_TIMEOUT: c_int = 1;

/// Returned when the library caught an internal panic.
pub const HTTPQ_ERR_INTERNAL: c_long = -1;

/// One `key=value` pair of a url-encoded body.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct HttpqKeyValue {
    pub key: *const c_char,
    pub value: *const c_char,
}

/// One field of a multipart body. When `is_file` is non-zero, `value` is
/// the path of the file whose contents are uploaded.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct HttpqFormField {
    pub name: *const c_char,
    pub value: *const c_char,
    pub is_file: c_int,
}

/// Static description for `httpq_error`, built once from
/// [`ErrorCode::describe`].
pub(crate) fn error_cstr(code: c_long) -> &'static CStr {
    static DESCRIPTIONS: OnceLock<HashMap<c_long, CString>> = OnceLock::new();
    let table = DESCRIPTIONS.get_or_init(|| {
        ErrorCode::ALL
            .into_iter()
            .filter_map(|code| Some((to_c(code), CString::new(code.describe()).ok()?)))
            .collect()
    });
    match table.get(&code) {
        Some(text) => text.as_c_str(),
        None if code == HTTPQ_ERR_INTERNAL => c"Internal library error",
        None => c"Unknown error",
    }
}

pub(crate) fn to_c(code: ErrorCode) -> c_long {
    code.code() as c_long
}

pub(crate) fn result_code(result: Result<(), ErrorCode>) -> c_long {
    to_c(result.err().unwrap_or(ErrorCode::Ok))
}
