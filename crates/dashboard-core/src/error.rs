//! 대시보드 갱신 에러 타입.
//!
//! 컨트롤러 수명주기 에러(`RefreshError`)와 개별 조회 실패(`FetchError`)를
//! 구분합니다. 조회 실패는 폴링을 멈추지 않고 `RefreshState::Failed`로만 보고됩니다.

use thiserror::Error;

/// 갱신 컨트롤러/레지스트리 에러.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// 잘못된 대상 설정 (0 주기, 빈 이름 등)
    #[error("설정 에러: {0}")]
    Config(String),

    /// 이미 폴링 중인 대상
    #[error("이미 시작된 대상: {0}")]
    AlreadyStarted(String),

    /// 레지스트리에 없는 대상
    #[error("등록되지 않은 대상: {0}")]
    NotRegistered(String),

    /// 동일 이름 대상 중복 등록
    #[error("중복 등록된 대상: {0}")]
    Duplicate(String),

    /// tokio 런타임 밖에서 호출됨
    #[error("런타임 에러: {0}")]
    Runtime(String),
}

/// 갱신 작업을 위한 Result 타입.
pub type RefreshResult<T> = Result<T, RefreshError>;

/// 단일 조회(fetch) 실패.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// 네트워크/연결 실패
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 서버가 오류 상태 코드를 반환
    #[error("HTTP {code}: {message}")]
    Status { code: u16, message: String },

    /// 응답 본문 디코딩 실패
    #[error("디코딩 에러: {0}")]
    Decode(String),

    /// 요청 타임아웃
    #[error("타임아웃: {0}")]
    Timeout(String),

    /// 기타
    #[error("조회 실패: {0}")]
    Other(String),
}

impl FetchError {
    /// 일시적인 실패인지 확인합니다.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(_) | FetchError::Timeout(_) => true,
            FetchError::Status { code, .. } => *code >= 500 || *code == 429,
            FetchError::Decode(_) | FetchError::Other(_) => false,
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}
