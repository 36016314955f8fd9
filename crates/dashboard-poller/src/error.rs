//! 에러 타입 정의.

use dashboard_core::{FetchError, RefreshError, StoreError};
use thiserror::Error;

/// 백엔드 REST API 호출 에러
#[derive(Debug, Error)]
pub enum ApiError {
    /// 네트워크/연결 에러
    #[error("HTTP 요청 실패: {0}")]
    Network(String),

    /// 요청 타임아웃
    #[error("요청 타임아웃: {0}")]
    Timeout(String),

    /// 오류 상태 코드
    #[error("API 에러 {code}: {message}")]
    Status { code: u16, message: String },

    /// 응답 디코딩 실패
    #[error("응답 파싱 실패: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<ApiError> for FetchError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Network(msg) => FetchError::Network(msg),
            ApiError::Timeout(msg) => FetchError::Timeout(msg),
            ApiError::Status { code, message } => FetchError::Status { code, message },
            ApiError::Decode(msg) => FetchError::Decode(msg),
        }
    }
}

/// Poller 에러 타입
#[derive(Debug, Error)]
pub enum PollerError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// API 에러
    #[error(transparent)]
    Api(#[from] ApiError),

    /// 폴링 컨트롤러 에러
    #[error(transparent)]
    Refresh(#[from] RefreshError),

    /// 저장소 에러
    #[error(transparent)]
    Store(#[from] StoreError),

    /// 수집 작업 실패
    #[error("수집 작업 실패: {0}")]
    Job(String),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, PollerError>;
