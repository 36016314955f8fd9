//! 대시보드 패널 목록과 폴링 대상 생성.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashboard_core::RefreshTarget;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{DashboardApiClient, JsonEndpoint};
use crate::config::PanelConfig;

/// 기본 패널 목록.
///
/// | 패널 | 주기 | 비고 |
/// |---|---|---|
/// | scheduler-status | 30초 | |
/// | data-status | 60초 | 데이터 최신 상태 |
/// | etf-rotation | 30초 | 실시간 모드 전용 |
/// | sector-flow | 60초 | 업종별 수급 |
/// | spike-ranking | 30초 | 급등 랭킹 |
pub fn default_panels() -> Vec<PanelConfig> {
    vec![
        panel("scheduler-status", "/api/v1/scheduler/status", 30, false),
        panel("data-status", "/api/v1/dataset/status", 60, false),
        panel("etf-rotation", "/api/v1/etf/rotation/realtime", 30, true),
        panel("sector-flow", "/api/v1/sector/flow", 60, false),
        panel("spike-ranking", "/api/v1/ranking/spike", 30, false),
    ]
}

fn panel(name: &str, path: &str, interval_secs: u64, realtime_only: bool) -> PanelConfig {
    PanelConfig {
        name: name.to_string(),
        path: path.to_string(),
        interval: Duration::from_secs(interval_secs),
        realtime_only,
    }
}

/// 패널 설정으로 폴링 대상을 생성합니다.
///
/// 실시간 전용 패널은 `realtime` 플래그가 꺼지면 폴링을 멈춥니다.
pub fn build_target(
    client: &DashboardApiClient,
    panel: &PanelConfig,
    realtime: Arc<AtomicBool>,
) -> RefreshTarget<Value> {
    let target = RefreshTarget::new(
        panel.name.clone(),
        JsonEndpoint::new(client.clone(), panel.path.clone()),
        panel.interval,
    );

    if panel.realtime_only {
        target.with_liveness(move || realtime.load(Ordering::SeqCst))
    } else {
        target
    }
}

/// 수집 작업 상태 응답
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    /// 실행 중 여부
    #[serde(default)]
    pub running: bool,
    /// 진행률 (%)
    #[serde(default)]
    pub progress: Option<f64>,
    /// 상태 메시지
    #[serde(default)]
    pub message: Option<String>,
}
