// C-compatible 타입 정의
// asar 네이티브 라이브러리와 공유되는 데이터 구조 (필드 순서 고정)

use libc::{c_char, c_double, c_int};

/// 에러/경고 구조체 (asar_geterrors, asar_getwarnings)
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawAsarError {
    pub fullerrdata: *const c_char,
    pub rawerrdata: *const c_char,
    pub block: *const c_char,
    pub filename: *const c_char,
    pub line: c_int,
    pub callerfilename: *const c_char,
    pub callerline: c_int,
}

/// 라벨 구조체 (asar_getalllabels)
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawAsarLabel {
    pub name: *const c_char,
    pub location: c_int,
}

/// define 구조체 (asar_getalldefines)
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawAsarDefine {
    pub name: *const c_char,
    pub contents: *const c_char,
}

// 네이티브 진입점 시그니처
pub type InitFn = unsafe extern "C" fn() -> bool;
pub type CloseFn = unsafe extern "C" fn() -> bool;
pub type VersionFn = unsafe extern "C" fn() -> c_int;
pub type ApiVersionFn = unsafe extern "C" fn() -> c_int;
pub type ResetFn = unsafe extern "C" fn() -> bool;
pub type PatchFn = unsafe extern "C" fn(
    patch_location: *const c_char,
    rom_data: *mut c_char,
    buf_len: c_int,
    rom_len: *mut c_int,
) -> bool;
pub type MaxRomSizeFn = unsafe extern "C" fn() -> c_int;
pub type GetErrorsFn = unsafe extern "C" fn(count: *mut c_int) -> *const RawAsarError;
pub type GetPrintsFn = unsafe extern "C" fn(count: *mut c_int) -> *const *const c_char;
pub type GetAllLabelsFn = unsafe extern "C" fn(count: *mut c_int) -> *const RawAsarLabel;
pub type GetLabelValFn = unsafe extern "C" fn(name: *const c_char) -> c_int;
pub type GetDefineFn = unsafe extern "C" fn(name: *const c_char) -> *const c_char;
pub type GetAllDefinesFn = unsafe extern "C" fn(count: *mut c_int) -> *const RawAsarDefine;
pub type ResolveDefinesFn =
    unsafe extern "C" fn(data: *const c_char, learn_new: bool) -> *const c_char;
pub type MathFn =
    unsafe extern "C" fn(math: *const c_char, error: *mut *const c_char) -> c_double;
