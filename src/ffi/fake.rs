// 테스트용 스크립트 엔진
// 실제 asar 라이브러리 없이 NativeApi 계약(포인터 수명, 버퍼 크기 검사)을 흉내낸다.

use std::collections::{BTreeMap, HashMap};
use std::ffi::{CStr, CString};
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;

use libc::{c_char, c_double, c_int};

use super::library::NativeApi;
use super::types::{RawAsarDefine, RawAsarError, RawAsarLabel};

/// 패치 파일 하나의 동작
#[derive(Debug, Clone, Default)]
pub struct ScriptedPatch {
    pub writes: Vec<(usize, Vec<u8>)>,
    pub labels: Vec<(String, i32)>,
    /// UTF-8이 아닌 이름의 라벨
    pub byte_labels: Vec<(Vec<u8>, i32)>,
    pub defines: Vec<(String, String)>,
    pub prints: Vec<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// 호출 기록 (엔진이 Box로 넘어간 뒤에도 테스트에서 확인용)
#[derive(Debug, Default)]
pub struct FakeCalls {
    pub init: AtomicUsize,
    pub close: AtomicUsize,
    pub reset: AtomicUsize,
    pub patch: AtomicUsize,
    pub last_buf_len: AtomicI32,
}

impl FakeCalls {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

struct OwnedError {
    full: CString,
    raw: CString,
    block: Option<CString>,
    filename: CString,
    line: c_int,
}

pub struct FakeEngine {
    key: usize,
    pub api_version: c_int,
    pub version: c_int,
    pub max_rom_size: c_int,
    pub init_result: bool,
    calls: Arc<FakeCalls>,
    patches: HashMap<String, ScriptedPatch>,

    errors: Vec<OwnedError>,
    warnings: Vec<OwnedError>,
    prints: Vec<CString>,
    labels: Vec<(CString, c_int)>,
    defines: BTreeMap<String, CString>,
    define_names: Vec<CString>,
    resolved: Option<CString>,
    math_error: Option<CString>,

    // 마지막 조회 결과 (다음 호출 전까지 유효)
    raw_errors: Vec<RawAsarError>,
    raw_labels: Vec<RawAsarLabel>,
    raw_defines: Vec<RawAsarDefine>,
    raw_prints: Vec<*const c_char>,
}

// raw_* 포인터는 모두 이 구조체가 소유한 CString을 가리킨다
unsafe impl Send for FakeEngine {}

/// 네이티브 엔진이 남는 버퍼 공간에 쓰는 값
pub const SCRATCH_BYTE: u8 = 0xAA;

static NEXT_ENGINE_KEY: AtomicUsize = AtomicUsize::new(1);

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            key: NEXT_ENGINE_KEY.fetch_add(1, Ordering::SeqCst),
            api_version: 200,
            version: 10901,
            max_rom_size: 0x1_0000,
            init_result: true,
            calls: Arc::new(FakeCalls::default()),
            patches: HashMap::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            prints: Vec::new(),
            labels: Vec::new(),
            defines: BTreeMap::new(),
            define_names: Vec::new(),
            resolved: None,
            math_error: None,
            raw_errors: Vec::new(),
            raw_labels: Vec::new(),
            raw_defines: Vec::new(),
            raw_prints: Vec::new(),
        }
    }

    pub fn with_patch(mut self, name: &str, patch: ScriptedPatch) -> Self {
        self.patches.insert(name.to_string(), patch);
        self
    }

    /// 같은 전역 엔진을 가리키는 두 번째 API (같은 라이브러리를 다시 연 경우)
    pub fn same_engine(&self) -> Self {
        let mut twin = Self::new();
        twin.key = self.key;
        twin.calls = Arc::clone(&self.calls);
        twin
    }

    pub fn calls(&self) -> Arc<FakeCalls> {
        Arc::clone(&self.calls)
    }

    fn clear_output(&mut self) {
        self.errors.clear();
        self.warnings.clear();
        self.prints.clear();
        self.labels.clear();
        self.defines.clear();
        self.resolved = None;
        self.math_error = None;
    }

    fn diagnostic(file: &str, line: c_int, message: &str, kind: &str) -> OwnedError {
        let full = if line > 0 {
            format!("{}:{}: {}: {}", file, line, kind, message)
        } else {
            format!("{}: {}", kind, message)
        };

        OwnedError {
            full: cstring(&full),
            raw: cstring(message),
            block: None,
            filename: cstring(file),
            line,
        }
    }

    fn raw_diagnostics(list: &[OwnedError]) -> Vec<RawAsarError> {
        list.iter()
            .map(|e| RawAsarError {
                fullerrdata: e.full.as_ptr(),
                rawerrdata: e.raw.as_ptr(),
                block: e.block.as_ref().map_or(std::ptr::null(), |b| b.as_ptr()),
                filename: e.filename.as_ptr(),
                line: e.line,
                callerfilename: std::ptr::null(),
                callerline: -1,
            })
            .collect()
    }

    fn expand(&mut self, text: &str) -> Option<String> {
        let mut out = String::new();
        let mut rest = text;

        while let Some(pos) = rest.find('!') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            let name = &after[..end];

            match self.defines.get(name) {
                Some(value) => out.push_str(&value.to_string_lossy()),
                None => {
                    let message = format!("Define '{}' not found.", name);
                    self.errors.push(Self::diagnostic("", -1, &message, "error"));
                    return None;
                }
            }
            rest = &after[end..];
        }

        out.push_str(rest);
        Some(out)
    }
}

fn cstring(value: &str) -> CString {
    CString::new(value.replace('\0', "")).unwrap()
}

fn parse_term(term: &str) -> Option<f64> {
    let term = term.trim();
    if let Some(hex) = term.strip_prefix('$') {
        i64::from_str_radix(hex, 16).ok().map(|v| v as f64)
    } else {
        term.parse::<i64>().ok().map(|v| v as f64)
    }
}

impl NativeApi for FakeEngine {
    fn engine_key(&self) -> usize {
        self.key
    }

    unsafe fn init(&mut self) -> bool {
        self.calls.init.fetch_add(1, Ordering::SeqCst);
        self.init_result
    }

    unsafe fn close(&mut self) -> bool {
        self.calls.close.fetch_add(1, Ordering::SeqCst);
        true
    }

    unsafe fn version(&mut self) -> c_int {
        self.version
    }

    unsafe fn api_version(&mut self) -> c_int {
        self.api_version
    }

    unsafe fn reset(&mut self) -> bool {
        self.calls.reset.fetch_add(1, Ordering::SeqCst);
        self.clear_output();
        true
    }

    unsafe fn patch(
        &mut self,
        patch_location: *const c_char,
        rom_data: *mut c_char,
        buf_len: c_int,
        rom_len: *mut c_int,
    ) -> bool {
        self.calls.patch.fetch_add(1, Ordering::SeqCst);
        self.calls.last_buf_len.store(buf_len, Ordering::SeqCst);
        self.clear_output();

        let name = CStr::from_ptr(patch_location).to_string_lossy().into_owned();
        let script = match self.patches.get(&name) {
            Some(script) => script.clone(),
            None => {
                let message = format!("File '{}' wasn't found.", name);
                self.errors.push(Self::diagnostic(&name, -1, &message, "error"));
                return false;
            }
        };

        for (i, message) in script.warnings.iter().enumerate() {
            let line = i as c_int + 1;
            self.warnings.push(Self::diagnostic(&name, line, message, "warning"));
        }

        if !script.errors.is_empty() {
            for (i, message) in script.errors.iter().enumerate() {
                let line = i as c_int + 1;
                self.errors.push(Self::diagnostic(&name, line, message, "error"));
            }
            return false;
        }

        let in_len = (*rom_len).max(0) as usize;
        let end = script
            .writes
            .iter()
            .map(|(offset, bytes)| offset + bytes.len())
            .max()
            .unwrap_or(0)
            .max(in_len);

        if buf_len < 0 || end > buf_len as usize {
            let message = "The given buffer is too small to contain the resulting ROM.";
            self.errors.push(Self::diagnostic(&name, -1, message, "error"));
            return false;
        }

        let buf = std::slice::from_raw_parts_mut(rom_data as *mut u8, buf_len as usize);
        buf[in_len..end].fill(0);
        // 결과 뒤쪽 버퍼는 작업 공간으로 더럽힌다
        buf[end..].fill(SCRATCH_BYTE);
        for (offset, bytes) in &script.writes {
            buf[*offset..*offset + bytes.len()].copy_from_slice(bytes);
        }

        self.labels = script
            .labels
            .iter()
            .map(|(n, loc)| (cstring(n), *loc))
            .chain(
                script
                    .byte_labels
                    .iter()
                    .map(|(n, loc)| (CString::new(n.clone()).unwrap(), *loc)),
            )
            .collect();
        for (n, contents) in &script.defines {
            self.defines.insert(n.clone(), cstring(contents));
        }
        self.prints = script.prints.iter().map(|p| cstring(p)).collect();

        *rom_len = end as c_int;
        true
    }

    unsafe fn max_rom_size(&mut self) -> c_int {
        self.max_rom_size
    }

    unsafe fn get_errors(&mut self, count: *mut c_int) -> *const RawAsarError {
        self.raw_errors = Self::raw_diagnostics(&self.errors);
        *count = self.raw_errors.len() as c_int;
        self.raw_errors.as_ptr()
    }

    unsafe fn get_warnings(&mut self, count: *mut c_int) -> *const RawAsarError {
        self.raw_errors = Self::raw_diagnostics(&self.warnings);
        *count = self.raw_errors.len() as c_int;
        self.raw_errors.as_ptr()
    }

    unsafe fn get_prints(&mut self, count: *mut c_int) -> *const *const c_char {
        self.raw_prints = self.prints.iter().map(|p| p.as_ptr()).collect();
        *count = self.raw_prints.len() as c_int;
        if self.raw_prints.is_empty() {
            // 결과가 없을 때 NULL을 주는 엔진도 있다
            return std::ptr::null();
        }
        self.raw_prints.as_ptr()
    }

    unsafe fn get_all_labels(&mut self, count: *mut c_int) -> *const RawAsarLabel {
        self.raw_labels = self
            .labels
            .iter()
            .map(|(name, location)| RawAsarLabel {
                name: name.as_ptr(),
                location: *location,
            })
            .collect();
        *count = self.raw_labels.len() as c_int;
        self.raw_labels.as_ptr()
    }

    unsafe fn get_label_val(&mut self, name: *const c_char) -> c_int {
        let name = CStr::from_ptr(name);
        self.labels
            .iter()
            .find(|(n, _)| n.as_c_str() == name)
            .map_or(-1, |(_, location)| *location)
    }

    unsafe fn get_define(&mut self, name: *const c_char) -> *const c_char {
        let name = CStr::from_ptr(name).to_string_lossy();
        self.defines
            .get(name.as_ref())
            .map_or(std::ptr::null(), |value| value.as_ptr())
    }

    unsafe fn get_all_defines(&mut self, count: *mut c_int) -> *const RawAsarDefine {
        self.define_names = self.defines.keys().map(|k| cstring(k)).collect();
        self.raw_defines = self
            .define_names
            .iter()
            .zip(self.defines.values())
            .map(|(name, contents)| RawAsarDefine {
                name: name.as_ptr(),
                contents: contents.as_ptr(),
            })
            .collect();
        *count = self.raw_defines.len() as c_int;
        self.raw_defines.as_ptr()
    }

    unsafe fn resolve_defines(&mut self, data: *const c_char, learn_new: bool) -> *const c_char {
        let text = CStr::from_ptr(data).to_string_lossy().into_owned();

        if learn_new {
            if let Some((lhs, rhs)) = text.split_once('=') {
                if let Some(name) = lhs.trim().strip_prefix('!') {
                    let value = match self.expand(rhs.trim()) {
                        Some(value) => value,
                        None => return std::ptr::null(),
                    };
                    self.defines.insert(name.to_string(), cstring(&value));
                    self.resolved = Some(cstring(""));
                    return self.resolved.as_ref().map_or(std::ptr::null(), |r| r.as_ptr());
                }
            }
        }

        match self.expand(&text) {
            Some(expanded) => {
                self.resolved = Some(cstring(&expanded));
                self.resolved.as_ref().map_or(std::ptr::null(), |r| r.as_ptr())
            }
            None => std::ptr::null(),
        }
    }

    unsafe fn math(&mut self, math: *const c_char, error: *mut *const c_char) -> c_double {
        let text = CStr::from_ptr(math).to_string_lossy().into_owned();
        let mut total = 0.0;

        for term in text.split('+') {
            match parse_term(term) {
                Some(value) => total += value,
                None => {
                    self.math_error = Some(cstring(&format!("Invalid number: {}", term.trim())));
                    *error = self.math_error.as_ref().map_or(std::ptr::null(), |e| e.as_ptr());
                    return 0.0;
                }
            }
        }

        *error = std::ptr::null();
        total
    }
}
