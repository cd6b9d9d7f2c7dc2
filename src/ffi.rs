//! FFI bindings for humangate
//!
//! C-compatible functions for hosts (webviews, native shells) that receive
//! device events themselves and forward them to a capture handle. All strings
//! are null-terminated JSON; returned strings must be freed with
//! `humangate_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::capture::state::CaptureState;
use crate::capture::types::CaptureEvent;
use crate::features::{EnvironmentProbes, FeatureVectorBuilder};
use crate::form::FormState;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

unsafe fn cstr_to_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Parse an optional JSON argument; NULL means "use the default"
unsafe fn parse_or_default<T: serde::de::DeserializeOwned + Default>(
    ptr: *const c_char,
    what: &str,
) -> Result<T, String> {
    if ptr.is_null() {
        return Ok(T::default());
    }
    let json = cstr_to_str(ptr).ok_or_else(|| format!("Invalid {} string pointer", what))?;
    serde_json::from_str(json).map_err(|e| format!("Invalid {} JSON: {}", what, e))
}

// ============================================================================
// Capture Handle API
// ============================================================================

/// Opaque handle to one form session's capture state
pub struct CaptureHandle {
    state: CaptureState,
}

/// Create a capture handle for a form mounted at `session_start_ms`.
///
/// # Safety
/// - Returns a pointer that must be freed with `humangate_capture_free`.
#[no_mangle]
pub unsafe extern "C" fn humangate_capture_new(session_start_ms: u64) -> *mut CaptureHandle {
    clear_last_error();
    Box::into_raw(Box::new(CaptureHandle {
        state: CaptureState::new(session_start_ms),
    }))
}

/// Free a capture handle. Freeing ends the capture session.
///
/// # Safety
/// - `handle` must be a pointer returned by `humangate_capture_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn humangate_capture_free(handle: *mut CaptureHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Apply one event, e.g. `{"at": 1700000000123, "type": "key_down", "key": "Tab"}`.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `humangate_capture_new`.
/// - `event_json` must be a valid null-terminated C string.
/// - Returns 0 on success, -1 on error; call `humangate_last_error` for the message.
#[no_mangle]
pub unsafe extern "C" fn humangate_capture_apply(
    handle: *mut CaptureHandle,
    event_json: *const c_char,
) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null capture handle");
        return -1;
    }
    let handle = &mut *handle;

    let json = match cstr_to_str(event_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid event string pointer");
            return -1;
        }
    };

    match serde_json::from_str::<CaptureEvent>(json) {
        Ok(event) => {
            handle.state.apply(&event);
            0
        }
        Err(e) => {
            set_last_error(&format!("Invalid event JSON: {}", e));
            -1
        }
    }
}

/// Serialize the current capture state to JSON.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `humangate_capture_new`.
/// - Returns a newly allocated string that must be freed with `humangate_free_string`.
/// - Returns NULL on error; call `humangate_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn humangate_capture_snapshot(handle: *const CaptureHandle) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null capture handle");
        return ptr::null_mut();
    }

    match serde_json::to_string(&(*handle).state) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Build the feature vector at `now_ms` and return it as a JSON array of 20 numbers.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `humangate_capture_new`.
/// - `form_json` and `probes_json` must be valid null-terminated C strings or NULL (defaults).
/// - Returns a newly allocated string that must be freed with `humangate_free_string`.
/// - Returns NULL on error; call `humangate_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn humangate_build_features(
    handle: *const CaptureHandle,
    form_json: *const c_char,
    probes_json: *const c_char,
    now_ms: u64,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null capture handle");
        return ptr::null_mut();
    }

    let form: FormState = match parse_or_default(form_json, "form") {
        Ok(form) => form,
        Err(msg) => {
            set_last_error(&msg);
            return ptr::null_mut();
        }
    };
    let probes: EnvironmentProbes = match parse_or_default(probes_json, "probes") {
        Ok(probes) => probes,
        Err(msg) => {
            set_last_error(&msg);
            return ptr::null_mut();
        }
    };

    let vector = FeatureVectorBuilder::build(&(*handle).state, &form, &probes, now_ms);
    match serde_json::to_string(&vector) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Validation API
// ============================================================================

/// Validate `{"email": ..., "password": ...}` and return the validation result as JSON.
///
/// # Safety
/// - `form_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `humangate_free_string`.
/// - Returns NULL on error; call `humangate_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn humangate_validate_form(form_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json = match cstr_to_str(form_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid form string pointer");
            return ptr::null_mut();
        }
    };

    let mut form: FormState = match serde_json::from_str(json) {
        Ok(form) => form,
        Err(e) => {
            set_last_error(&format!("Invalid form JSON: {}", e));
            return ptr::null_mut();
        }
    };

    match serde_json::to_string(&form.validate()) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by humangate functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a humangate function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn humangate_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next humangate call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn humangate_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn humangate_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
