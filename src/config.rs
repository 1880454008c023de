// 바인딩 설정
// 라이브러리 경로와 최소 API 버전 (환경 변수로 덮어쓰기 가능)

use std::env;
use std::path::PathBuf;

use crate::version::{ApiVersion, EXPECTED_API_VERSION};

/// 라이브러리 경로 환경 변수
pub const LIBRARY_PATH_ENV: &str = "ASAR_LIBRARY_PATH";
/// 최소 API 버전 환경 변수
pub const MIN_API_VERSION_ENV: &str = "ASAR_MIN_API_VERSION";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingConfig {
    /// asar 공유 라이브러리 경로 (기본값: 플랫폼별 파일 이름, 시스템 검색 경로 사용)
    pub library_path: PathBuf,
    /// 허용하는 최소 API 버전. 메이저는 항상 바인딩 기준 메이저로 고정된다.
    pub min_api_version: i32,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            library_path: PathBuf::from(libloading::library_filename("asar")),
            min_api_version: EXPECTED_API_VERSION,
        }
    }
}

impl BindingConfig {
    /// 프로세스 환경 변수로 기본값을 덮어쓴 설정
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup(LIBRARY_PATH_ENV).filter(|p| !p.is_empty()) {
            config.library_path = PathBuf::from(path);
        }

        if let Some(raw) = lookup(MIN_API_VERSION_ENV) {
            match raw.trim().parse::<i32>() {
                Ok(v) if v > 0 => config.min_api_version = ApiVersion::clamp_minimum(v).0,
                _ => log::warn!(
                    "ignoring {}={:?}, using {}",
                    MIN_API_VERSION_ENV,
                    raw,
                    config.min_api_version
                ),
            }
        }

        config
    }
}
