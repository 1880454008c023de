// 바인딩 에러 타입
// 예상 가능한 네이티브 결과(패치 실패, 라벨 없음 등)는 에러가 아니라 값으로 돌려준다.

use std::path::PathBuf;

use thiserror::Error;

use crate::session::EngineState;

#[derive(Debug, Error)]
pub enum AsarError {
    #[error("failed to load asar library {path:?}: {reason}")]
    LibraryLoad { path: PathBuf, reason: String },

    #[error("asar library is missing symbol `{name}`: {reason}")]
    MissingSymbol { name: &'static str, reason: String },

    /// ABI 버전 불일치 (네이티브 init은 호출되지 않음)
    #[error("incompatible asar API version {found} (binding expects {expected})")]
    VersionMismatch { expected: i32, found: i32 },

    /// 같은 엔진을 다른 세션이 이미 초기화함
    #[error("asar engine is already owned by another session")]
    AlreadyOpen,

    #[error("asar_init reported failure")]
    InitFailed,

    #[error("asar engine is not ready (state: {0})")]
    NotReady(EngineState),

    /// shutdown 이후의 호출. 재초기화는 지원하지 않는다.
    #[error("asar engine has been closed")]
    Closed,

    #[error("{what} contains an interior NUL byte")]
    InteriorNul { what: &'static str },

    #[error("ROM buffer of {0} bytes exceeds the native size limit")]
    BufferTooLarge(usize),
}

pub type Result<T> = std::result::Result<T, AsarError>;
