//! # FFI Types
//!
//! C-compatible types for cross-platform FFI.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

/// FFI-safe result type
///
/// Used to return results across the FFI boundary.
#[repr(C)]
pub struct FfiResult {
    /// Success flag (1 = success, 0 = error)
    pub success: i32,
    /// Error code (0 if success)
    pub error_code: i32,
    /// Error message (null if success)
    pub error_message: *mut c_char,
    /// Result data (null if error)
    pub data: *mut c_char,
}

impl FfiResult {
    /// Create a successful result with data
    pub fn ok(data: String) -> Self {
        Self {
            success: 1,
            error_code: 0,
            error_message: std::ptr::null_mut(),
            data: into_c_string(data),
        }
    }

    /// Create a successful result without data
    pub fn ok_empty() -> Self {
        Self {
            success: 1,
            error_code: 0,
            error_message: std::ptr::null_mut(),
            data: std::ptr::null_mut(),
        }
    }

    /// Create an error result
    pub fn err(code: i32, message: String) -> Self {
        Self {
            success: 0,
            error_code: code,
            error_message: into_c_string(message),
            data: std::ptr::null_mut(),
        }
    }

    /// Create from a Rust Result
    pub fn from_result<T: ToString>(result: crate::Result<T>) -> Self {
        match result {
            Ok(value) => Self::ok(value.to_string()),
            Err(e) => Self::err(e.code(), e.to_string()),
        }
    }

    /// Create from a dispatcher result
    pub fn from_dispatch(result: Result<String, (i32, String)>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err((code, message)) => Self::err(code, message),
        }
    }
}

/// Hand a Rust string to C; interior NULs are dropped
pub(crate) fn into_c_string(s: String) -> *mut c_char {
    let s = if s.contains('\0') { s.replace('\0', "") } else { s };
    CString::new(s).unwrap_or_default().into_raw()
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Convert a C string to a Rust String
///
/// # Safety
/// The caller must ensure the pointer is valid and null-terminated.
pub unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(String::from)
}

/// Free a C string allocated by Rust
///
/// # Safety
/// The pointer must have been allocated by Rust using CString::into_raw().
#[no_mangle]
pub unsafe extern "C" fn hushpost_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

/// Free an FfiResult
///
/// # Safety
/// The FfiResult must have been created by Rust FFI functions.
#[no_mangle]
pub unsafe extern "C" fn hushpost_free_result(result: FfiResult) {
    if !result.error_message.is_null() {
        drop(CString::from_raw(result.error_message));
    }
    if !result.data.is_null() {
        drop(CString::from_raw(result.data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(ptr: *mut c_char) -> String {
        unsafe { cstr_to_string(ptr).unwrap() }
    }

    #[test]
    fn test_ok_and_err() {
        let ok = FfiResult::ok(r#"{"a":1}"#.into());
        assert_eq!(ok.success, 1);
        assert!(ok.error_message.is_null());
        assert_eq!(read(ok.data), r#"{"a":1}"#);
        unsafe { hushpost_free_result(ok) };

        let err = FfiResult::from_result::<String>(Err(crate::Error::NotConnected));
        assert_eq!(err.success, 0);
        assert_eq!(err.error_code, 600);
        assert!(err.data.is_null());
        unsafe { hushpost_free_result(err) };
    }

    #[test]
    fn test_interior_nul_is_dropped() {
        let ptr = into_c_string("a\0b".into());
        assert_eq!(read(ptr), "ab");
        unsafe { hushpost_free_string(ptr) };
    }

    #[test]
    fn test_null_pointer() {
        assert!(unsafe { cstr_to_string(std::ptr::null()) }.is_none());
    }
}
