// 경계 변환 유틸리티
// 네이티브 포인터 → 소유된 Rust 값, Rust 값 → C 문자열

use std::ffi::{CStr, CString};
use std::path::Path;

use libc::{c_char, c_int};

use crate::error::{AsarError, Result};

/// C 문자열을 소유된 String으로 복사 (NULL → None)
///
/// asar는 ANSI(8비트) 문자열을 돌려준다. 유효한 UTF-8이면 그대로,
/// 아니면 각 바이트를 Latin-1 코드포인트로 옮겨 바이트 손실 없이 복사한다.
///
/// # Safety
/// `ptr`은 NULL이거나 NUL로 끝나는 유효한 문자열을 가리켜야 한다.
pub unsafe fn owned_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }

    let bytes = CStr::from_ptr(ptr).to_bytes();
    Some(decode_ansi(bytes))
}

/// C 문자열 바이트를 그대로 복사 (NULL → None)
///
/// # Safety
/// [`owned_string`]과 동일.
pub unsafe fn owned_bytes(ptr: *const c_char) -> Option<Vec<u8>> {
    if ptr.is_null() {
        return None;
    }

    Some(CStr::from_ptr(ptr).to_bytes().to_vec())
}

/// NULL을 빈 문자열로 취급하는 버전 (레코드 필드용)
///
/// # Safety
/// [`owned_string`]과 동일.
pub unsafe fn owned_string_or_empty(ptr: *const c_char) -> String {
    owned_string(ptr).unwrap_or_default()
}

/// 8비트 문자열 디코딩
pub fn decode_ansi(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_owned(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

/// (포인터, 개수) → 슬라이스. NULL 또는 개수 <= 0 이면 빈 슬라이스
///
/// # Safety
/// `ptr`이 NULL이 아니고 `count > 0`이면 `count`개의 연속된 `T`를 가리켜야 하며,
/// 반환된 슬라이스를 쓰는 동안 네이티브 쪽이 버퍼를 해제하면 안 된다.
pub unsafe fn raw_slice<'a, T>(ptr: *const T, count: c_int) -> &'a [T] {
    if ptr.is_null() || count <= 0 {
        return &[];
    }

    std::slice::from_raw_parts(ptr, count as usize)
}

/// 호출 인자를 C 문자열로 변환 (내부 NUL → 에러)
pub fn c_string(value: &str, what: &'static str) -> Result<CString> {
    CString::new(value).map_err(|_| AsarError::InteriorNul { what })
}

/// 네이티브 바이트 인자를 그대로 C 문자열로 (내부 NUL → 에러)
pub fn c_bytes(value: &[u8], what: &'static str) -> Result<CString> {
    CString::new(value).map_err(|_| AsarError::InteriorNul { what })
}

/// 패치 경로를 C 문자열로 변환
///
/// Unix에서는 OS 바이트를 그대로 넘기고, 그 외에는 경로 문자열을 넘긴다.
pub fn path_c_string(path: &Path) -> Result<CString> {
    #[cfg(unix)]
    let bytes = {
        use std::os::unix::ffi::OsStrExt;
        path.as_os_str().as_bytes().to_vec()
    };
    #[cfg(not(unix))]
    let bytes = path.to_string_lossy().into_owned().into_bytes();

    CString::new(bytes).map_err(|_| AsarError::InteriorNul { what: "patch path" })
}
