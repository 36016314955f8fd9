//! 대시보드 상태 저장소.
//!
//! 패널 상태는 `StoreAction`을 통해서만 변경됩니다. 외부에서 필드를 직접
//! 수정하지 않으므로 "수집 작업은 한 번에 하나만 실행" 같은 불변식을 한 곳에서
//! 강제할 수 있습니다.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::refresh::{RefreshEvent, RefreshState};

/// 저장소 에러.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// 다른 수집 작업이 실행 중
    #[error("이미 실행 중인 수집 작업: {running}")]
    JobAlreadyRunning { running: String },

    /// 실행 중이 아닌 작업을 종료하려 함
    #[error("실행 중이 아닌 수집 작업: {0}")]
    JobNotRunning(String),
}

/// 저장소 상태 변경 액션.
#[derive(Debug, Clone)]
pub enum StoreAction {
    /// 패널 조회 시작
    RefreshStarted { panel: String },
    /// 패널 조회 성공
    RefreshSucceeded {
        panel: String,
        payload: Value,
        at: DateTime<Utc>,
    },
    /// 패널 조회 실패
    RefreshFailed { panel: String, reason: String },
    /// 패널이 다음 주기를 기다리는 상태로 복귀
    RefreshIdle { panel: String },
    /// 패널 제거 (화면에서 사라짐)
    PanelRemoved { panel: String },
    /// 수집 작업 시작
    JobStarted { job: String },
    /// 수집 작업 종료
    JobFinished { job: String },
}

/// 패널 하나의 최신 상태.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PanelSnapshot {
    /// 갱신 상태
    pub state: RefreshState,
    /// 마지막 성공 결과
    pub payload: Option<Value>,
    /// 마지막 성공 시각
    pub updated_at: Option<DateTime<Utc>>,
    /// 마지막 실패 사유
    pub last_error: Option<String>,
    /// 연속 실패 횟수
    pub failures: u32,
}

impl PanelSnapshot {
    /// 데이터 만료 여부 확인.
    ///
    /// 한 번도 성공하지 못한 패널은 만료로 봅니다.
    ///
    /// # Arguments
    ///
    /// * `now` - 기준 시각
    /// * `max_age_secs` - 최대 허용 시간 (초)
    pub fn is_stale(&self, now: DateTime<Utc>, max_age_secs: i64) -> bool {
        match self.updated_at {
            Some(updated_at) => (now - updated_at).num_seconds() > max_age_secs,
            None => true,
        }
    }
}

/// 저장소 상태 (reducer 대상).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreState {
    panels: BTreeMap<String, PanelSnapshot>,
    running_job: Option<String>,
}

impl StoreState {
    /// 액션을 적용합니다.
    pub fn reduce(&mut self, action: StoreAction) -> Result<(), StoreError> {
        match action {
            StoreAction::RefreshStarted { panel } => {
                self.panels.entry(panel).or_default().state = RefreshState::InFlight;
            }
            StoreAction::RefreshSucceeded { panel, payload, at } => {
                let snapshot = self.panels.entry(panel).or_default();
                snapshot.state = RefreshState::Idle;
                snapshot.payload = Some(payload);
                snapshot.updated_at = Some(at);
                snapshot.failures = 0;
            }
            StoreAction::RefreshFailed { panel, reason } => {
                let snapshot = self.panels.entry(panel).or_default();
                snapshot.state = RefreshState::Failed(reason.clone());
                snapshot.last_error = Some(reason);
                snapshot.failures += 1;
            }
            StoreAction::RefreshIdle { panel } => {
                self.panels.entry(panel).or_default().state = RefreshState::Idle;
            }
            StoreAction::PanelRemoved { panel } => {
                self.panels.remove(&panel);
            }
            StoreAction::JobStarted { job } => {
                if let Some(running) = &self.running_job {
                    return Err(StoreError::JobAlreadyRunning {
                        running: running.clone(),
                    });
                }
                self.running_job = Some(job);
            }
            StoreAction::JobFinished { job } => {
                if self.running_job.as_deref() != Some(job.as_str()) {
                    return Err(StoreError::JobNotRunning(job));
                }
                self.running_job = None;
            }
        }
        Ok(())
    }

    /// 패널 스냅샷 조회.
    pub fn panel(&self, name: &str) -> Option<&PanelSnapshot> {
        self.panels.get(name)
    }

    /// 전체 패널.
    pub fn panels(&self) -> &BTreeMap<String, PanelSnapshot> {
        &self.panels
    }

    /// 실행 중인 수집 작업.
    pub fn running_job(&self) -> Option<&str> {
        self.running_job.as_deref()
    }
}

/// 갱신 이벤트를 저장소 액션으로 변환합니다.
pub fn action_for_event(event: &RefreshEvent<Value>) -> StoreAction {
    let panel = event.target.clone();
    match (&event.state, &event.payload) {
        (RefreshState::Idle, Some(payload)) => StoreAction::RefreshSucceeded {
            panel,
            payload: payload.clone(),
            at: event.at,
        },
        (RefreshState::Idle, None) => StoreAction::RefreshIdle { panel },
        (RefreshState::InFlight, _) => StoreAction::RefreshStarted { panel },
        (RefreshState::Failed(reason), _) => StoreAction::RefreshFailed {
            panel,
            reason: reason.clone(),
        },
    }
}

/// 공유 대시보드 저장소.
#[derive(Debug, Default)]
pub struct DashboardStore {
    state: RwLock<StoreState>,
}

impl DashboardStore {
    /// 빈 저장소 생성.
    pub fn new() -> Self {
        Self::default()
    }

    /// 액션을 적용합니다.
    pub async fn dispatch(&self, action: StoreAction) -> Result<(), StoreError> {
        self.state.write().await.reduce(action)
    }

    /// 갱신 이벤트를 적용합니다.
    pub async fn apply_event(&self, event: &RefreshEvent<Value>) {
        // 갱신 액션은 실패하지 않음
        let _ = self.dispatch(action_for_event(event)).await;
    }

    /// 패널 스냅샷 조회.
    pub async fn panel(&self, name: &str) -> Option<PanelSnapshot> {
        self.state.read().await.panel(name).cloned()
    }

    /// 전체 상태 스냅샷.
    pub async fn snapshot(&self) -> StoreState {
        self.state.read().await.clone()
    }

    /// 만료된 패널 이름 목록.
    pub async fn stale_panels(&self, now: DateTime<Utc>, max_age_secs: i64) -> Vec<String> {
        self.state
            .read()
            .await
            .panels()
            .iter()
            .filter(|(_, snapshot)| snapshot.is_stale(now, max_age_secs))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// 실행 중인 수집 작업.
    pub async fn running_job(&self) -> Option<String> {
        self.state.read().await.running_job().map(str::to_string)
    }
}
