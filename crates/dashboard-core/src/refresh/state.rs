//! 갱신 상태와 이벤트.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 대상별 갱신 상태.
///
/// `Idle → InFlight` (tick 또는 수동 갱신), `InFlight → Idle` (성공),
/// `InFlight → Failed` (실패), `Failed → Idle` (다음 tick).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum RefreshState {
    /// 대기 중
    #[default]
    Idle,
    /// 조회 진행 중
    InFlight,
    /// 마지막 조회 실패 (사유)
    Failed(String),
}

impl RefreshState {
    /// 조회 진행 중인지 확인합니다.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, RefreshState::InFlight)
    }

    /// 실패 상태인지 확인합니다.
    pub fn is_failed(&self) -> bool {
        matches!(self, RefreshState::Failed(_))
    }

    /// 실패 사유.
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            RefreshState::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl std::fmt::Display for RefreshState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshState::Idle => write!(f, "idle"),
            RefreshState::InFlight => write!(f, "in-flight"),
            RefreshState::Failed(reason) => write!(f, "failed({})", reason),
        }
    }
}

/// 상태 전이 알림.
///
/// 관찰 가능한 상태가 바뀔 때마다 하나씩 발행됩니다. `payload`는 조회 성공
/// (`InFlight → Idle`) 시에만 채워지며, 실패 사유는 `state`에 담깁니다.
#[derive(Debug, Clone)]
pub struct RefreshEvent<T> {
    /// 대상 이름
    pub target: String,
    /// 새 상태
    pub state: RefreshState,
    /// 조회 결과 (성공 시)
    pub payload: Option<T>,
    /// 발생 시각
    pub at: DateTime<Utc>,
}

impl<T> RefreshEvent<T> {
    pub(crate) fn new(target: &str, state: RefreshState, payload: Option<T>) -> Self {
        Self {
            target: target.to_string(),
            state,
            payload,
            at: Utc::now(),
        }
    }

    /// 조회 성공 이벤트인지 확인합니다.
    pub fn is_success(&self) -> bool {
        self.payload.is_some()
    }
}
