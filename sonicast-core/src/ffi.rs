//! C ABI for linking sonicast-core as a static library from mobile (NDK) or other C/C++ hosts.
//! The host owns audio output; it asks for a WAV buffer and plays it itself.

use std::ffi::c_void;
use std::os::raw::c_int;
use std::slice;

use crate::container::ContainerFormat;
use crate::protocol::ProtocolVersion;
use crate::session::Session;
use crate::transmitter::Transmitter;

/// Default protocol version byte.
#[no_mangle]
pub extern "C" fn sonicast_default_version() -> u8 {
    ProtocolVersion::default().wire_byte()
}

/// Create a transmitter producing WAV output. Returns opaque handle, or null if the
/// configuration is rejected (sample rate, version, repeat count).
#[no_mangle]
pub extern "C" fn sonicast_transmitter_create(
    sample_rate: u32,
    version: u8,
    low_bit_rate: c_int,
    repeat_count: u32,
) -> *mut c_void {
    let Ok(version) = ProtocolVersion::try_from(version) else {
        return std::ptr::null_mut();
    };
    let session = match Session::builder()
        .sample_rate(sample_rate)
        .version(version)
        .low_bit_rate(low_bit_rate != 0)
        .repeat_count(repeat_count)
        .output_format(ContainerFormat::Wav)
        .build()
    {
        Ok(s) => s,
        Err(_) => return std::ptr::null_mut(),
    };
    Box::into_raw(Box::new(Transmitter::new(session))) as *mut c_void
}

/// Destroy transmitter. No-op if h is null.
#[no_mangle]
pub extern "C" fn sonicast_transmitter_destroy(h: *mut c_void) {
    if h.is_null() {
        return;
    }
    let _ = unsafe { Box::from_raw(h as *mut Transmitter) };
}

/// Repeat count the host should play the buffer for. Returns 0 if h is null.
#[no_mangle]
pub extern "C" fn sonicast_repeat_count(h: *mut c_void) -> u32 {
    if h.is_null() {
        return 0;
    }
    let tx = unsafe { &*(h as *const Transmitter) };
    tx.session().repeat_count()
}

unsafe fn payload_slice<'a>(payload: *const u8, len: usize) -> Option<&'a [u8]> {
    if len == 0 {
        return Some(&[]);
    }
    if payload.is_null() {
        return None;
    }
    Some(slice::from_raw_parts(payload, len))
}

/// Size in bytes of the WAV buffer for `payload`. Returns -1 on error.
#[no_mangle]
pub extern "C" fn sonicast_wav_len(h: *mut c_void, payload: *const u8, len: usize) -> i64 {
    if h.is_null() {
        return -1;
    }
    let tx = unsafe { &*(h as *const Transmitter) };
    let Some(data) = (unsafe { payload_slice(payload, len) }) else {
        return -1;
    };
    match tx.plan(data) {
        Ok(plan) => (crate::container::WAV_HEADER_LEN + 2 * plan.total_samples()) as i64,
        Err(_) => -1,
    }
}

/// Encode `payload` as a WAV container into out_buf. Returns bytes written, or -1 on error
/// (null handle, payload too large, out_buf too small).
#[no_mangle]
pub extern "C" fn sonicast_encode_wav(
    h: *mut c_void,
    payload: *const u8,
    len: usize,
    out_buf: *mut u8,
    out_buf_len: usize,
) -> i64 {
    if h.is_null() || out_buf.is_null() {
        return -1;
    }
    let tx = unsafe { &*(h as *const Transmitter) };
    let Some(data) = (unsafe { payload_slice(payload, len) }) else {
        return -1;
    };
    let (bytes, _) = match tx.encode_to_container(data) {
        Ok(x) => x,
        Err(_) => return -1,
    };
    if bytes.len() > out_buf_len {
        return -1;
    }
    unsafe {
        out_buf.copy_from_nonoverlapping(bytes.as_ptr(), bytes.len());
    }
    bytes.len() as i64
}
