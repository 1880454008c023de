// 버전 정보
// API 버전: major*100 + minor (minor는 하위 호환 변경, major는 비호환 변경)
// 엔진 버전: major*10000 + minor*100 + bugfix (1.2.34 → 10234)

use std::fmt;

/// 이 바인딩이 작성된 기준 API 버전
pub const EXPECTED_API_VERSION: i32 = 200;

/// API 버전
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ApiVersion(pub i32);

impl ApiVersion {
    pub fn major(self) -> i32 {
        self.0 / 100
    }

    pub fn minor(self) -> i32 {
        self.0 % 100
    }

    /// 이 바인딩의 구조체/시그니처가 맞춰진 API
    pub const fn expected() -> Self {
        ApiVersion(EXPECTED_API_VERSION)
    }

    /// 네이티브 버전이 `minimum`과 호환되는지
    ///
    /// 메이저는 항상 [`EXPECTED_API_VERSION`]의 메이저와 같아야 하고,
    /// 그 안에서 `minimum` 이상이어야 한다.
    pub fn is_compatible_with(self, minimum: ApiVersion) -> bool {
        self.major() == Self::expected().major() && self >= minimum
    }

    /// 설정된 최소 버전을 바인딩 메이저 안으로 제한
    ///
    /// 메이저가 다르거나 기준보다 낮으면 [`EXPECTED_API_VERSION`]을 쓴다.
    pub fn clamp_minimum(configured: i32) -> Self {
        let configured = ApiVersion(configured);
        let expected = Self::expected();

        if configured.major() != expected.major() || configured < expected {
            log::warn!(
                "minimum asar API version {} is outside API {}.xx, using {}",
                configured,
                expected.major(),
                expected
            );
            expected
        } else {
            configured
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.major(), self.minor())
    }
}

/// 엔진 버전
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EngineVersion {
    pub major: i32,
    pub minor: i32,
    pub bugfix: i32,
}

impl EngineVersion {
    pub fn from_raw(raw: i32) -> Self {
        Self {
            major: raw / 10000,
            minor: (raw / 100) % 100,
            bugfix: raw % 100,
        }
    }
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.bugfix)
    }
}
