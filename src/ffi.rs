//! FFI bindings for the Skitii engine
//!
//! This module provides C-compatible functions for driving an engine from a
//! host UI. Strings cross the boundary as null-terminated JSON; every string
//! returned must be freed by the caller with `skitii_free_string`.
//!
//! Failures return NULL (or -1) and set the thread's last error. Absent
//! outcomes, such as ending a session when none is active, return NULL
//! without setting an error.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use serde::Serialize;

use crate::config::EngineConfig;
use crate::engine::BiofeedbackEngine;
use crate::error::EngineError;
use crate::identity::{PatientIdentity, StaticIdentity};
use crate::types::Zone;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Serialize a value into a newly allocated C string
fn json_to_cstr<T: Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&EngineError::from(e).to_string());
            ptr::null_mut()
        }
    }
}

/// Borrow the engine behind a handle, recording an error for NULL
unsafe fn engine_mut<'a>(handle: *mut SkitiiEngineHandle) -> Option<&'a mut BiofeedbackEngine> {
    if handle.is_null() {
        set_last_error("Null engine pointer");
        return None;
    }
    Some(&mut (*handle).engine)
}

// ============================================================================
// Engine lifecycle
// ============================================================================

/// Opaque handle to a BiofeedbackEngine
pub struct SkitiiEngineHandle {
    engine: BiofeedbackEngine,
}

/// Create an engine from a JSON configuration, or the defaults for NULL.
///
/// # Safety
/// - `config_json` must be NULL or a valid null-terminated C string.
/// - Returns a pointer that must be freed with `skitii_engine_free`.
/// - Returns NULL on error; call `skitii_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn skitii_engine_new(config_json: *const c_char) -> *mut SkitiiEngineHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        EngineConfig::default()
    } else {
        let json = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match EngineConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    match BiofeedbackEngine::new(config) {
        Ok(engine) => Box::into_raw(Box::new(SkitiiEngineHandle { engine })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free an engine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `skitii_engine_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn skitii_engine_free(engine: *mut SkitiiEngineHandle) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Sign a patient in from identity JSON, or sign out with NULL.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `skitii_engine_new`.
/// - `identity_json` must be NULL or a valid null-terminated C string.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn skitii_engine_set_patient(
    engine: *mut SkitiiEngineHandle,
    identity_json: *const c_char,
) -> i32 {
    clear_last_error();

    let Some(engine) = engine_mut(engine) else {
        return -1;
    };

    if identity_json.is_null() {
        engine.set_identity_provider(Box::new(StaticIdentity::anonymous()));
        return 0;
    }

    let patient = cstr_to_string(identity_json).and_then(|json| PatientIdentity::restore(&json));
    match patient {
        Some(patient) => {
            engine.set_identity_provider(Box::new(StaticIdentity::signed_in(patient)));
            0
        }
        None => {
            set_last_error("Invalid patient identity");
            -1
        }
    }
}

/// Advance the engine clock by `ticks` ticks.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `skitii_engine_new`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn skitii_engine_tick(engine: *mut SkitiiEngineHandle, ticks: u32) -> i32 {
    clear_last_error();

    match engine_mut(engine) {
        Some(engine) => {
            engine.run(u64::from(ticks));
            0
        }
        None => -1,
    }
}

/// Stop all periodic work.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `skitii_engine_new`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn skitii_engine_shutdown(engine: *mut SkitiiEngineHandle) -> i32 {
    clear_last_error();

    match engine_mut(engine) {
        Some(engine) => {
            engine.shutdown();
            0
        }
        None => -1,
    }
}

/// Current engine state as snapshot JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `skitii_engine_new`.
/// - Returns a newly allocated string that must be freed with `skitii_free_string`.
/// - Returns NULL on error; call `skitii_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn skitii_engine_snapshot(engine: *mut SkitiiEngineHandle) -> *mut c_char {
    clear_last_error();

    match engine_mut(engine) {
        Some(engine) => json_to_cstr(&engine.snapshot()),
        None => ptr::null_mut(),
    }
}

// ============================================================================
// Session
// ============================================================================

/// Start a session and return its id.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `skitii_engine_new`.
/// - Returns a newly allocated string that must be freed with `skitii_free_string`.
/// - Returns NULL on error; call `skitii_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn skitii_engine_start_session(
    engine: *mut SkitiiEngineHandle,
) -> *mut c_char {
    clear_last_error();

    let Some(engine) = engine_mut(engine) else {
        return ptr::null_mut();
    };

    match engine.start_session() {
        Ok(session_id) => string_to_cstr(&session_id),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// End the active session and return its record JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `skitii_engine_new`.
/// - Returns a newly allocated string that must be freed with `skitii_free_string`.
/// - Returns NULL without an error when no session is active or nobody is signed in.
#[no_mangle]
pub unsafe extern "C" fn skitii_engine_end_session(engine: *mut SkitiiEngineHandle) -> *mut c_char {
    clear_last_error();

    match engine_mut(engine).and_then(|engine| engine.end_session()) {
        Some(record) => json_to_cstr(&record),
        None => ptr::null_mut(),
    }
}

/// Export the active or just-ended session as JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `skitii_engine_new`.
/// - Returns a newly allocated string that must be freed with `skitii_free_string`.
/// - Returns NULL without an error when there is nothing to export.
#[no_mangle]
pub unsafe extern "C" fn skitii_engine_export_session(
    engine: *mut SkitiiEngineHandle,
) -> *mut c_char {
    clear_last_error();

    match engine_mut(engine).and_then(|engine| engine.export_session()) {
        Some(export) => json_to_cstr(&export),
        None => ptr::null_mut(),
    }
}

/// Record a pain score (clamped to 0-10).
///
/// # Safety
/// - `engine` must be a valid pointer returned by `skitii_engine_new`.
/// - Returns the stored score, or -1 on error.
#[no_mangle]
pub unsafe extern "C" fn skitii_engine_set_pain_score(
    engine: *mut SkitiiEngineHandle,
    score: i32,
) -> i32 {
    clear_last_error();

    match engine_mut(engine) {
        Some(engine) => i32::from(engine.set_pain_score(score)),
        None => -1,
    }
}

// ============================================================================
// Signal overrides
// ============================================================================

/// Turn manual zone mode on (non-zero) or off (zero).
///
/// # Safety
/// - `engine` must be a valid pointer returned by `skitii_engine_new`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn skitii_engine_set_manual_mode(
    engine: *mut SkitiiEngineHandle,
    enabled: i32,
) -> i32 {
    clear_last_error();

    match engine_mut(engine) {
        Some(engine) => {
            engine.set_manual_mode(enabled != 0);
            0
        }
        None => -1,
    }
}

/// Pin manual readings to a zone ("low", "normal" or "high").
///
/// # Safety
/// - `engine` must be a valid pointer returned by `skitii_engine_new`.
/// - `zone` must be a valid null-terminated C string.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn skitii_engine_set_manual_zone(
    engine: *mut SkitiiEngineHandle,
    zone: *const c_char,
) -> i32 {
    clear_last_error();

    let Some(engine) = engine_mut(engine) else {
        return -1;
    };

    let zone_str = match cstr_to_string(zone) {
        Some(s) => s,
        None => {
            set_last_error("Invalid zone string pointer");
            return -1;
        }
    };

    match zone_str.parse::<Zone>() {
        Ok(zone) => {
            engine.set_manual_zone(zone);
            0
        }
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Hide the stress alert.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `skitii_engine_new`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn skitii_engine_dismiss_stress_alert(
    engine: *mut SkitiiEngineHandle,
) -> i32 {
    clear_last_error();

    match engine_mut(engine) {
        Some(engine) => {
            engine.dismiss_stress_alert();
            0
        }
        None => -1,
    }
}

// ============================================================================
// Player
// ============================================================================

/// Player actions that take no arguments
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkitiiPlayerAction {
    Play = 0,
    Pause = 1,
    TogglePlay = 2,
    SkipNext = 3,
    SkipPrevious = 4,
    DismissAdaptationAlert = 5,
}

/// Apply a player action.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `skitii_engine_new`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn skitii_engine_player_action(
    engine: *mut SkitiiEngineHandle,
    action: SkitiiPlayerAction,
) -> i32 {
    clear_last_error();

    let Some(engine) = engine_mut(engine) else {
        return -1;
    };

    match action {
        SkitiiPlayerAction::Play => engine.play(),
        SkitiiPlayerAction::Pause => engine.pause(),
        SkitiiPlayerAction::TogglePlay => engine.toggle_play(),
        SkitiiPlayerAction::SkipNext => engine.skip_next(),
        SkitiiPlayerAction::SkipPrevious => engine.skip_previous(),
        SkitiiPlayerAction::DismissAdaptationAlert => engine.dismiss_adaptation_alert(),
    }
    0
}

/// Set the volume (clamped to 0-100).
///
/// # Safety
/// - `engine` must be a valid pointer returned by `skitii_engine_new`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn skitii_engine_set_volume(
    engine: *mut SkitiiEngineHandle,
    volume: i32,
) -> i32 {
    clear_last_error();

    match engine_mut(engine) {
        Some(engine) => {
            engine.set_volume(volume);
            0
        }
        None => -1,
    }
}

/// Play a catalog track by id and return its JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `skitii_engine_new`.
/// - `track_id` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `skitii_free_string`.
/// - Returns NULL on error; call `skitii_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn skitii_engine_select_track(
    engine: *mut SkitiiEngineHandle,
    track_id: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(engine) = engine_mut(engine) else {
        return ptr::null_mut();
    };

    let id = match cstr_to_string(track_id) {
        Some(s) => s,
        None => {
            set_last_error("Invalid track id string pointer");
            return ptr::null_mut();
        }
    };

    match engine.select_track(&id) {
        Some(track) => json_to_cstr(&track),
        None => {
            set_last_error(&EngineError::UnknownTrack(id).to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Skitii functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Skitii function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn skitii_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Skitii function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn skitii_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the engine library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn skitii_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        skitii_free_string(ptr);
        s
    }

    unsafe fn seeded_engine() -> *mut SkitiiEngineHandle {
        let config = CString::new(r#"{"seed": 42}"#).unwrap();
        let engine = skitii_engine_new(config.as_ptr());
        assert!(!engine.is_null());
        engine
    }

    unsafe fn sign_in(engine: *mut SkitiiEngineHandle) {
        let identity =
            CString::new(r#"{"patientId": "PT001", "name": "Rajesh Kumar", "age": 45}"#).unwrap();
        assert_eq!(skitii_engine_set_patient(engine, identity.as_ptr()), 0);
    }

    #[test]
    fn test_ffi_session_lifecycle() {
        unsafe {
            let engine = seeded_engine();
            sign_in(engine);

            let session_id = take_string(skitii_engine_start_session(engine));
            assert!(session_id.starts_with("SES-"));

            assert_eq!(skitii_engine_set_pain_score(engine, 12), 10);
            assert_eq!(skitii_engine_tick(engine, 9), 0);
            assert_eq!(skitii_engine_set_pain_score(engine, 6), 6);

            let export = take_string(skitii_engine_export_session(engine));
            let export: serde_json::Value = serde_json::from_str(&export).unwrap();
            assert_eq!(export["sessionId"], session_id.as_str());
            assert_eq!(export["durationSeconds"], 9);
            assert_eq!(export["metrics"]["improvement"], 4);
            assert_eq!(export["hrvReadings"].as_array().unwrap().len(), 3);

            let record = take_string(skitii_engine_end_session(engine));
            assert!(record.contains(&session_id));

            // Nothing left to end: NULL without an error
            assert!(skitii_engine_end_session(engine).is_null());
            assert!(skitii_last_error().is_null());

            skitii_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_end_session_signed_out() {
        unsafe {
            let engine = seeded_engine();
            take_string(skitii_engine_start_session(engine));

            assert!(skitii_engine_end_session(engine).is_null());
            assert!(skitii_last_error().is_null());

            sign_in(engine);
            assert_eq!(skitii_engine_set_patient(engine, ptr::null()), 0);
            assert!(skitii_engine_export_session(engine).is_null());

            skitii_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_manual_zone_and_snapshot() {
        unsafe {
            let engine = seeded_engine();
            let low = CString::new("low").unwrap();
            assert_eq!(skitii_engine_set_manual_mode(engine, 1), 0);
            assert_eq!(skitii_engine_set_manual_zone(engine, low.as_ptr()), 0);
            assert_eq!(skitii_engine_tick(engine, 6), 0);

            let snapshot = take_string(skitii_engine_snapshot(engine));
            let snapshot: serde_json::Value = serde_json::from_str(&snapshot).unwrap();
            assert_eq!(snapshot["zone"], "low");
            assert_eq!(snapshot["isStressAlertVisible"], true);

            assert_eq!(skitii_engine_dismiss_stress_alert(engine), 0);
            let snapshot = take_string(skitii_engine_snapshot(engine));
            let snapshot: serde_json::Value = serde_json::from_str(&snapshot).unwrap();
            assert_eq!(snapshot["manualZone"], "normal");
            assert_eq!(snapshot["isStressAlertVisible"], false);

            skitii_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_player_controls() {
        unsafe {
            let engine = seeded_engine();
            assert_eq!(skitii_engine_player_action(engine, SkitiiPlayerAction::Play), 0);
            assert_eq!(skitii_engine_set_volume(engine, 150), 0);

            let deep_rest = CString::new("track_004").unwrap();
            let track = take_string(skitii_engine_select_track(engine, deep_rest.as_ptr()));
            assert!(track.contains("Deep Rest"));

            let snapshot = take_string(skitii_engine_snapshot(engine));
            let snapshot: serde_json::Value = serde_json::from_str(&snapshot).unwrap();
            assert_eq!(snapshot["playback"]["volume"], 100);
            assert_eq!(snapshot["playback"]["isPlaying"], true);
            assert_eq!(snapshot["playback"]["currentTrack"]["id"], "track_004");

            assert_eq!(skitii_engine_player_action(engine, SkitiiPlayerAction::Pause), 0);
            skitii_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let bad_config = CString::new(r#"{"window_size": 0}"#).unwrap();
            assert!(skitii_engine_new(bad_config.as_ptr()).is_null());
            assert!(!skitii_last_error().is_null());

            let engine = seeded_engine();
            let unknown = CString::new("track_404").unwrap();
            assert!(skitii_engine_select_track(engine, unknown.as_ptr()).is_null());
            let error = CStr::from_ptr(skitii_last_error()).to_str().unwrap();
            assert!(error.contains("track_404"));

            let calm = CString::new("calm").unwrap();
            assert_eq!(skitii_engine_set_manual_zone(engine, calm.as_ptr()), -1);

            let garbage = CString::new("{not json").unwrap();
            assert_eq!(skitii_engine_set_patient(engine, garbage.as_ptr()), -1);

            assert_eq!(skitii_engine_tick(ptr::null_mut(), 1), -1);
            let error = CStr::from_ptr(skitii_last_error()).to_str().unwrap();
            assert!(error.contains("Null engine"));

            skitii_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = skitii_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
