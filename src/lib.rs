// asar 바인딩
// 네이티브 asar 패치 엔진(C ABI)을 안전한 Rust API로 감싼다.
// 패치/수식/define 처리는 모두 네이티브 라이브러리가 하고, 이 크레이트는 경계 변환과
// 엔진 수명 관리만 담당한다.

pub mod config;
pub mod error;
pub mod ffi;
pub mod records;
pub mod session;
pub mod version;

pub use config::BindingConfig;
pub use error::{AsarError, Result};
pub use records::{DefineRecord, ErrorRecord, Evaluation, LabelRecord, PatchResult};
pub use session::{Asar, EngineState, LABEL_NOT_FOUND};
pub use version::{ApiVersion, EngineVersion, EXPECTED_API_VERSION};
