// asar 세션 핸들
// 네이티브 엔진은 프로세스 전역 상태이므로 엔진 상태도 전역 테이블에 두고,
// 모든 호출을 그 락 안에서 직렬화한다. 반환된 네이티브 메모리는 락을 놓기 전에 깊은 복사한다.

use std::fmt;
use std::path::Path;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use libc::{c_char, c_int};

use crate::config::BindingConfig;
use crate::error::{AsarError, Result};
use crate::ffi::library::{DynamicLibrary, NativeApi};
use crate::ffi::marshal;
use crate::records::{DefineRecord, ErrorRecord, Evaluation, LabelRecord, PatchResult};
use crate::version::{ApiVersion, EngineVersion};

/// `label_value`가 라벨을 찾지 못했을 때 돌려주는 값
///
/// 기존 호출자와의 호환을 위해 Option 대신 네이티브 규약(-1)을 그대로 쓴다.
pub const LABEL_NOT_FOUND: i32 = -1;

/// 초기화된 엔진 목록 (engine_key 단위). 이 락이 곧 네이티브 호출 락이다.
static ENGINES: Mutex<Vec<EngineSlot>> = Mutex::new(Vec::new());
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// 엔진 상태 머신
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Ready,
    /// 종료됨 (다시 초기화할 수 없음)
    Closed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Uninitialized => "uninitialized",
            EngineState::Ready => "ready",
            EngineState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// 초기화된 전역 엔진 하나 (Ready 또는 Closed)
struct EngineSlot {
    key: usize,
    owner: u64,
    state: EngineState,
}

/// asar 엔진 세션
///
/// `initialize` 성공 후에만 패치/조회가 가능하다. 한 엔진은 한 세션만 소유할 수 있고,
/// 소유 세션이 엔진을 닫으면 같은 엔진의 다른 세션도 모두 Closed가 된다.
/// 반환되는 값은 모두 소유된 복사본이라 이후 호출과 무관하게 계속 쓸 수 있다.
/// Drop 시 아직 Ready면 엔진을 닫는다.
pub struct Asar {
    api: Mutex<Box<dyn NativeApi>>,
    key: usize,
    id: u64,
    released: AtomicBool,
    min_api_version: ApiVersion,
}

fn lock_engines() -> MutexGuard<'static, Vec<EngineSlot>> {
    ENGINES.lock().unwrap_or_else(PoisonError::into_inner)
}

/// (포인터, 개수) 배열을 소유된 Vec으로 복사
///
/// # Safety
/// `ptr`/`count`는 네이티브가 방금 돌려준 값이어야 하고, 복사가 끝날 때까지
/// 엔진을 다시 호출하면 안 된다.
unsafe fn copy_array<T, R>(ptr: *const T, count: c_int, convert: impl Fn(&T) -> R) -> Vec<R> {
    marshal::raw_slice(ptr, count).iter().map(convert).collect()
}

impl Asar {
    /// 설정된 경로에서 asar 라이브러리를 로드 (초기화는 하지 않음)
    pub fn load(config: &BindingConfig) -> Result<Self> {
        let library = DynamicLibrary::open(&config.library_path)?;
        Ok(Self::with_api(Box::new(library), config.min_api_version))
    }

    /// 임의의 NativeApi 구현으로 세션 생성
    ///
    /// `min_api_version`의 메이저가 바인딩 기준과 다르면 기준 버전으로 바뀐다.
    pub fn with_api(api: Box<dyn NativeApi>, min_api_version: i32) -> Self {
        Self {
            key: api.engine_key(),
            api: Mutex::new(api),
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            released: AtomicBool::new(false),
            min_api_version: ApiVersion::clamp_minimum(min_api_version),
        }
    }

    fn lock_api(&self) -> MutexGuard<'_, Box<dyn NativeApi>> {
        self.api.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_in(&self, engines: &[EngineSlot]) -> EngineState {
        if self.released.load(Ordering::SeqCst) {
            return EngineState::Closed;
        }

        match engines.iter().find(|slot| slot.key == self.key) {
            None => EngineState::Uninitialized,
            Some(slot) if slot.state == EngineState::Closed => EngineState::Closed,
            Some(slot) if slot.owner == self.id => EngineState::Ready,
            // 다른 세션이 소유한 엔진
            Some(_) => EngineState::Uninitialized,
        }
    }

    /// Ready 상태에서만 네이티브 호출 실행
    fn with_engine<R>(&self, call: impl FnOnce(&mut dyn NativeApi) -> Result<R>) -> Result<R> {
        let engines = lock_engines();

        match self.state_in(&engines) {
            EngineState::Ready => call(&mut **self.lock_api()),
            EngineState::Closed => Err(AsarError::Closed),
            state => Err(AsarError::NotReady(state)),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state_in(&lock_engines())
    }

    /// 엔진 초기화
    ///
    /// 네이티브 API 버전을 먼저 확인하고, 메이저가 바인딩 기준과 다르거나 최소 버전보다
    /// 낮으면 asar_init을 부르지 않고 실패한다. 이미 Ready면 아무것도 하지 않는다.
    /// 같은 엔진을 다른 세션이 소유 중이면 `AlreadyOpen`.
    pub fn initialize(&self) -> Result<()> {
        let mut engines = lock_engines();

        match self.state_in(&engines) {
            EngineState::Ready => return Ok(()),
            EngineState::Closed => return Err(AsarError::Closed),
            EngineState::Uninitialized => {}
        }

        if engines.iter().any(|slot| slot.key == self.key) {
            return Err(AsarError::AlreadyOpen);
        }

        let mut api = self.lock_api();
        let found = ApiVersion(unsafe { api.api_version() });
        if !found.is_compatible_with(self.min_api_version) {
            log::warn!(
                "asar API version {} is incompatible with {}",
                found,
                self.min_api_version
            );
            return Err(AsarError::VersionMismatch {
                expected: self.min_api_version.0,
                found: found.0,
            });
        }

        if !unsafe { api.init() } {
            log::warn!("asar_init failed");
            return Err(AsarError::InitFailed);
        }

        engines.push(EngineSlot {
            key: self.key,
            owner: self.id,
            state: EngineState::Ready,
        });
        log::info!(
            "asar {} initialized (API {})",
            EngineVersion::from_raw(unsafe { api.version() }),
            found
        );
        Ok(())
    }

    /// 엔진 종료
    ///
    /// 소유 세션이 처음 닫을 때는 asar_close 결과를, 그 외에는 true를 돌려준다.
    /// 엔진을 소유하지 않은 세션은 네이티브 호출 없이 자신만 Closed가 된다.
    pub fn shutdown(&self) -> bool {
        let mut engines = lock_engines();
        let state = self.state_in(&engines);
        self.released.store(true, Ordering::SeqCst);

        if state != EngineState::Ready {
            return true;
        }

        let closed = unsafe { self.lock_api().close() };
        if let Some(slot) = engines.iter_mut().find(|slot| slot.key == self.key) {
            slot.state = EngineState::Closed;
        }
        log::info!("asar closed (native result: {})", closed);
        closed
    }

    /// 엔진 버전 (major*10000 + minor*100 + bugfix). 상태와 무관하게 호출 가능
    pub fn engine_version(&self) -> i32 {
        let _engines = lock_engines();
        unsafe { self.lock_api().version() }
    }

    pub fn engine_version_info(&self) -> EngineVersion {
        EngineVersion::from_raw(self.engine_version())
    }

    /// API 버전 (major*100 + minor). 상태와 무관하게 호출 가능
    pub fn api_version(&self) -> i32 {
        let _engines = lock_engines();
        unsafe { self.lock_api().api_version() }
    }

    /// 에러, 경고, 출력, 파일 캐시를 비운다 (패치할 때는 자동으로 수행됨)
    pub fn reset(&self) -> Result<bool> {
        self.with_engine(|api| {
            log::debug!("asar_reset");
            Ok(unsafe { api.reset() })
        })
    }

    /// 출력 ROM의 최대 크기
    pub fn max_rom_size(&self) -> Result<usize> {
        self.with_engine(|api| Ok(unsafe { api.max_rom_size() }.max(0) as usize))
    }

    /// 패치 적용 (ROM 버퍼를 직접 수정)
    ///
    /// ROM은 헤더가 없어야 한다. 호출 전에 버퍼를 최대 출력 크기까지 0으로 늘리고,
    /// 호출 후 네이티브가 보고한 길이로 자른다. 실패 시 상세 내용은 `errors()`.
    pub fn patch_in_place(&self, patch_path: impl AsRef<Path>, rom: &mut Vec<u8>) -> Result<bool> {
        let patch_path = patch_path.as_ref();
        let c_path = marshal::path_c_string(patch_path)?;

        self.with_engine(|api| {
            let max_size = unsafe { api.max_rom_size() }.max(0) as usize;
            let buf_size = rom.len().max(max_size);
            let buf_len = c_int::try_from(buf_size).map_err(|_| AsarError::BufferTooLarge(buf_size))?;
            let mut rom_len = rom.len() as c_int;

            rom.resize(buf_size, 0);

            log::debug!(
                "asar_patch {} (rom {} bytes, buffer {} bytes)",
                patch_path.display(),
                rom_len,
                buf_len
            );

            let success = unsafe {
                api.patch(
                    c_path.as_ptr(),
                    rom.as_mut_ptr() as *mut c_char,
                    buf_len,
                    &mut rom_len,
                )
            };

            let result_len = (rom_len.max(0) as usize).min(rom.len());
            rom.truncate(result_len);

            if success {
                log::debug!("asar_patch succeeded, result {} bytes", result_len);
            } else {
                log::warn!("asar_patch failed for {}", patch_path.display());
            }

            Ok(success)
        })
    }

    /// 패치 적용 (ROM 소유권을 받아 결과와 함께 돌려줌)
    pub fn apply_patch(&self, patch_path: impl AsRef<Path>, rom: Vec<u8>) -> Result<PatchResult> {
        let mut rom = rom;
        let success = self.patch_in_place(patch_path, &mut rom)?;
        Ok(PatchResult { success, rom })
    }

    /// 현재 에러 목록
    pub fn errors(&self) -> Result<Vec<ErrorRecord>> {
        self.with_engine(|api| unsafe {
            let mut count: c_int = 0;
            let ptr = api.get_errors(&mut count);
            Ok(copy_array(ptr, count, |raw| ErrorRecord::from_raw(raw)))
        })
    }

    /// 현재 경고 목록
    pub fn warnings(&self) -> Result<Vec<ErrorRecord>> {
        self.with_engine(|api| unsafe {
            let mut count: c_int = 0;
            let ptr = api.get_warnings(&mut count);
            Ok(copy_array(ptr, count, |raw| ErrorRecord::from_raw(raw)))
        })
    }

    /// 패치가 print로 출력한 문자열 (경고/에러는 포함되지 않음)
    pub fn prints(&self) -> Result<Vec<String>> {
        self.with_engine(|api| unsafe {
            let mut count: c_int = 0;
            let ptr = api.get_prints(&mut count);
            Ok(copy_array(ptr, count, |&line| marshal::owned_string_or_empty(line)))
        })
    }

    pub fn labels(&self) -> Result<Vec<LabelRecord>> {
        self.with_engine(|api| unsafe {
            let mut count: c_int = 0;
            let ptr = api.get_all_labels(&mut count);
            Ok(copy_array(ptr, count, |raw| LabelRecord::from_raw(raw)))
        })
    }

    /// 라벨 주소. 없으면 [`LABEL_NOT_FOUND`] (-1)
    ///
    /// 이름은 UTF-8 바이트로 전달된다. `labels()`가 돌려준 비 UTF-8 이름은
    /// [`LabelRecord::raw_name`]과 [`Asar::label_value_bytes`]로 조회한다.
    pub fn label_value(&self, name: &str) -> Result<i32> {
        self.label_value_bytes(name.as_bytes())
    }

    /// 라벨 주소 (네이티브 바이트 이름). 없으면 [`LABEL_NOT_FOUND`] (-1)
    pub fn label_value_bytes(&self, name: &[u8]) -> Result<i32> {
        let c_name = marshal::c_bytes(name, "label name")?;
        self.with_engine(|api| Ok(unsafe { api.get_label_val(c_name.as_ptr()) }))
    }

    /// define 값. 없으면 None
    pub fn define(&self, name: &str) -> Result<Option<String>> {
        let c_name = marshal::c_string(name, "define name")?;
        self.with_engine(|api| unsafe { Ok(marshal::owned_string(api.get_define(c_name.as_ptr()))) })
    }

    /// define 값을 네이티브 바이트 그대로. 없으면 None
    pub fn define_bytes(&self, name: &[u8]) -> Result<Option<Vec<u8>>> {
        let c_name = marshal::c_bytes(name, "define name")?;
        self.with_engine(|api| unsafe { Ok(marshal::owned_bytes(api.get_define(c_name.as_ptr()))) })
    }

    pub fn defines(&self) -> Result<Vec<DefineRecord>> {
        self.with_engine(|api| unsafe {
            let mut count: c_int = 0;
            let ptr = api.get_all_defines(&mut count);
            Ok(copy_array(ptr, count, |raw| DefineRecord::from_raw(raw)))
        })
    }

    /// 텍스트 안의 define을 치환
    ///
    /// `learn_new`가 true면 처리 중 만난 define 정의(`!name = value`)를 엔진의
    /// define 테이블에 저장한다. 이 테이블은 엔진 전역 상태라 이후 `define`,
    /// `defines`, `resolve_defines` 호출 결과가 바뀐다.
    pub fn resolve_defines(&self, text: &str, learn_new: bool) -> Result<Option<String>> {
        let c_text = marshal::c_string(text, "define text")?;
        self.with_engine(|api| unsafe {
            Ok(marshal::owned_string(api.resolve_defines(c_text.as_ptr(), learn_new)))
        })
    }

    /// 수식 계산 (예: "1+1")
    pub fn evaluate(&self, expression: &str) -> Result<Evaluation> {
        let c_expr = marshal::c_string(expression, "expression")?;
        self.with_engine(|api| unsafe {
            let mut error: *const c_char = ptr::null();
            let value = api.math(c_expr.as_ptr(), &mut error);
            Ok(Evaluation {
                value,
                error: marshal::owned_string(error),
            })
        })
    }
}

impl Drop for Asar {
    fn drop(&mut self) {
        if self.state() == EngineState::Ready {
            self.shutdown();
        }
    }
}
