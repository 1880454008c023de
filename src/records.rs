// 결과 레코드
// 네이티브 메모리에서 깊은 복사한 값 객체. 네이티브 포인터를 보관하지 않으므로
// 이후 패치/리셋과 무관하게 계속 사용할 수 있다.

use std::fmt;

use crate::ffi::marshal::{owned_bytes, owned_string_or_empty};
use crate::ffi::types::{RawAsarDefine, RawAsarError, RawAsarLabel};

/// 에러 또는 경고 한 건
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorRecord {
    /// 위치 정보가 포함된 전체 메시지
    pub full_message: String,
    /// 메시지 본문만
    pub raw_message: String,
    /// 문제가 된 소스 블록
    pub block: String,
    pub filename: String,
    /// 1부터 시작, 알 수 없으면 -1
    pub line: i32,
    /// 매크로 호출 위치 (없으면 빈 문자열)
    pub caller_filename: String,
    /// 1부터 시작, 알 수 없으면 -1
    pub caller_line: i32,
}

impl ErrorRecord {
    /// # Safety
    /// 모든 문자열 필드는 NULL이거나 유효한 C 문자열이어야 한다.
    pub(crate) unsafe fn from_raw(raw: &RawAsarError) -> Self {
        Self {
            full_message: owned_string_or_empty(raw.fullerrdata),
            raw_message: owned_string_or_empty(raw.rawerrdata),
            block: owned_string_or_empty(raw.block),
            filename: owned_string_or_empty(raw.filename),
            line: raw.line,
            caller_filename: owned_string_or_empty(raw.callerfilename),
            caller_line: raw.callerline,
        }
    }

    pub fn line(&self) -> Option<u32> {
        u32::try_from(self.line).ok().filter(|&l| l > 0)
    }

    pub fn caller_line(&self) -> Option<u32> {
        u32::try_from(self.caller_line).ok().filter(|&l| l > 0)
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_message)
    }
}

/// 라벨
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRecord {
    pub name: String,
    /// 네이티브가 돌려준 이름 바이트 (`label_value_bytes`에 그대로 넘길 수 있음)
    pub raw_name: Vec<u8>,
    /// 대상 ROM 주소 공간의 주소
    pub location: i32,
}

impl LabelRecord {
    pub(crate) unsafe fn from_raw(raw: &RawAsarLabel) -> Self {
        Self {
            name: owned_string_or_empty(raw.name),
            raw_name: owned_bytes(raw.name).unwrap_or_default(),
            location: raw.location,
        }
    }

    /// 주소 (음수 location이면 None)
    pub fn address(&self) -> Option<u32> {
        u32::try_from(self.location).ok()
    }
}

/// define
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefineRecord {
    pub name: String,
    /// 네이티브가 돌려준 이름 바이트 (`define_bytes`에 그대로 넘길 수 있음)
    pub raw_name: Vec<u8>,
    /// 비어 있을 수 있지만 NULL은 아님
    pub contents: String,
}

impl DefineRecord {
    pub(crate) unsafe fn from_raw(raw: &RawAsarDefine) -> Self {
        Self {
            name: owned_string_or_empty(raw.name),
            raw_name: owned_bytes(raw.name).unwrap_or_default(),
            contents: owned_string_or_empty(raw.contents),
        }
    }
}

/// 패치 결과 (ROM은 이미 실제 길이로 잘려 있음)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchResult {
    pub success: bool,
    pub rom: Vec<u8>,
}

impl PatchResult {
    pub fn len(&self) -> usize {
        self.rom.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rom.is_empty()
    }
}

/// 수식 계산 결과
///
/// `error`가 있으면 `value`는 의미 없는 값이다.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub value: f64,
    pub error: Option<String>,
}

impl Evaluation {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<f64, String> {
        match self.error {
            Some(message) => Err(message),
            None => Ok(self.value),
        }
    }
}
