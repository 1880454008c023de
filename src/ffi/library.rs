// 네이티브 asar 진입점
// NativeApi: 엔진 C ABI 1:1 대응 트레이트
// DynamicLibrary: libloading으로 공유 라이브러리에서 심볼을 해석하는 구현

use std::path::{Path, PathBuf};

use libc::{c_char, c_double, c_int};
use libloading::Library;

use super::types::*;
use crate::error::{AsarError, Result};

/// asar 엔진의 C ABI
///
/// 각 메서드는 같은 이름의 `asar_*` 진입점과 시그니처가 같다.
/// 반환된 포인터는 다음 엔진 호출 전까지만 유효하다.
///
/// # Safety
/// 모든 메서드는 C 함수와 같은 계약을 따른다: 문자열 인자는 NUL로 끝나야 하고,
/// 출력 포인터는 쓰기 가능해야 하며, 호출은 프로세스 전체에서 직렬화되어야 한다.
pub trait NativeApi: Send {
    /// 네이티브 엔진 식별자
    ///
    /// 같은 전역 엔진을 가리키는 구현은 같은 값을 돌려야 한다.
    /// 세션 상태는 이 값 단위로 프로세스 전체에서 공유된다.
    fn engine_key(&self) -> usize;

    unsafe fn init(&mut self) -> bool;
    unsafe fn close(&mut self) -> bool;
    unsafe fn version(&mut self) -> c_int;
    unsafe fn api_version(&mut self) -> c_int;
    unsafe fn reset(&mut self) -> bool;
    unsafe fn patch(
        &mut self,
        patch_location: *const c_char,
        rom_data: *mut c_char,
        buf_len: c_int,
        rom_len: *mut c_int,
    ) -> bool;
    unsafe fn max_rom_size(&mut self) -> c_int;
    unsafe fn get_errors(&mut self, count: *mut c_int) -> *const RawAsarError;
    unsafe fn get_warnings(&mut self, count: *mut c_int) -> *const RawAsarError;
    unsafe fn get_prints(&mut self, count: *mut c_int) -> *const *const c_char;
    unsafe fn get_all_labels(&mut self, count: *mut c_int) -> *const RawAsarLabel;
    unsafe fn get_label_val(&mut self, name: *const c_char) -> c_int;
    unsafe fn get_define(&mut self, name: *const c_char) -> *const c_char;
    unsafe fn get_all_defines(&mut self, count: *mut c_int) -> *const RawAsarDefine;
    unsafe fn resolve_defines(&mut self, data: *const c_char, learn_new: bool) -> *const c_char;
    unsafe fn math(&mut self, math: *const c_char, error: *mut *const c_char) -> c_double;
}

/// 런타임에 로드한 asar 공유 라이브러리
///
/// 함수 포인터는 `_library`가 살아있는 동안만 유효하므로 같은 구조체에 묶어 둔다.
pub struct DynamicLibrary {
    path: PathBuf,
    init: InitFn,
    close: CloseFn,
    version: VersionFn,
    api_version: ApiVersionFn,
    reset: ResetFn,
    patch: PatchFn,
    max_rom_size: MaxRomSizeFn,
    get_errors: GetErrorsFn,
    get_warnings: GetErrorsFn,
    get_prints: GetPrintsFn,
    get_all_labels: GetAllLabelsFn,
    get_label_val: GetLabelValFn,
    get_define: GetDefineFn,
    get_all_defines: GetAllDefinesFn,
    resolve_defines: ResolveDefinesFn,
    math: MathFn,
    _library: Library,
}

impl DynamicLibrary {
    /// 라이브러리를 열고 모든 asar_* 심볼을 해석
    ///
    /// 심볼이 하나라도 없으면 실패한다. 라이브러리 로드 시 초기화 코드가 실행되므로
    /// 신뢰할 수 있는 경로만 넘겨야 한다.
    pub fn open(path: &Path) -> Result<Self> {
        log::debug!("loading asar library from {}", path.display());

        let library = unsafe { Library::new(path) }.map_err(|e| AsarError::LibraryLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        unsafe fn symbol<T: Copy>(library: &Library, name: &'static str) -> Result<T> {
            // libloading은 NUL 종료된 이름을 그대로 사용한다
            let mut raw = Vec::with_capacity(name.len() + 1);
            raw.extend_from_slice(name.as_bytes());
            raw.push(0);

            library
                .get::<T>(&raw)
                .map(|sym| *sym)
                .map_err(|e| AsarError::MissingSymbol {
                    name,
                    reason: e.to_string(),
                })
        }

        unsafe {
            Ok(Self {
                path: path.to_path_buf(),
                init: symbol(&library, "asar_init")?,
                close: symbol(&library, "asar_close")?,
                version: symbol(&library, "asar_version")?,
                api_version: symbol(&library, "asar_apiversion")?,
                reset: symbol(&library, "asar_reset")?,
                patch: symbol(&library, "asar_patch")?,
                max_rom_size: symbol(&library, "asar_maxromsize")?,
                get_errors: symbol(&library, "asar_geterrors")?,
                get_warnings: symbol(&library, "asar_getwarnings")?,
                get_prints: symbol(&library, "asar_getprints")?,
                get_all_labels: symbol(&library, "asar_getalllabels")?,
                get_label_val: symbol(&library, "asar_getlabelval")?,
                get_define: symbol(&library, "asar_getdefine")?,
                get_all_defines: symbol(&library, "asar_getalldefines")?,
                resolve_defines: symbol(&library, "asar_resolvedefines")?,
                math: symbol(&library, "asar_math")?,
                _library: library,
            })
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NativeApi for DynamicLibrary {
    // 같은 라이브러리를 여러 번 열어도 매핑은 하나이므로 진입점 주소가 같다
    fn engine_key(&self) -> usize {
        self.init as usize
    }

    unsafe fn init(&mut self) -> bool {
        (self.init)()
    }

    unsafe fn close(&mut self) -> bool {
        (self.close)()
    }

    unsafe fn version(&mut self) -> c_int {
        (self.version)()
    }

    unsafe fn api_version(&mut self) -> c_int {
        (self.api_version)()
    }

    unsafe fn reset(&mut self) -> bool {
        (self.reset)()
    }

    unsafe fn patch(
        &mut self,
        patch_location: *const c_char,
        rom_data: *mut c_char,
        buf_len: c_int,
        rom_len: *mut c_int,
    ) -> bool {
        (self.patch)(patch_location, rom_data, buf_len, rom_len)
    }

    unsafe fn max_rom_size(&mut self) -> c_int {
        (self.max_rom_size)()
    }

    unsafe fn get_errors(&mut self, count: *mut c_int) -> *const RawAsarError {
        (self.get_errors)(count)
    }

    unsafe fn get_warnings(&mut self, count: *mut c_int) -> *const RawAsarError {
        (self.get_warnings)(count)
    }

    unsafe fn get_prints(&mut self, count: *mut c_int) -> *const *const c_char {
        (self.get_prints)(count)
    }

    unsafe fn get_all_labels(&mut self, count: *mut c_int) -> *const RawAsarLabel {
        (self.get_all_labels)(count)
    }

    unsafe fn get_label_val(&mut self, name: *const c_char) -> c_int {
        (self.get_label_val)(name)
    }

    unsafe fn get_define(&mut self, name: *const c_char) -> *const c_char {
        (self.get_define)(name)
    }

    unsafe fn get_all_defines(&mut self, count: *mut c_int) -> *const RawAsarDefine {
        (self.get_all_defines)(count)
    }

    unsafe fn resolve_defines(&mut self, data: *const c_char, learn_new: bool) -> *const c_char {
        (self.resolve_defines)(data, learn_new)
    }

    unsafe fn math(&mut self, math: *const c_char, error: *mut *const c_char) -> c_double {
        (self.math)(math, error)
    }
}
