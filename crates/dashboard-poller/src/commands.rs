//! CLI 명령 구현.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashboard_core::{
    DashboardStore, RefreshController, RefreshEvent, RefreshRegistry, RefreshState,
    RefreshTarget, StoreAction, StoreState,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{DashboardApiClient, JsonEndpoint};
use crate::config::{PanelConfig, PollerConfig};
use crate::error::{ApiError, PollerError};
use crate::panels::{build_target, JobStatus};
use crate::Result;

/// 패널 하나를 한 번 조회합니다.
pub async fn fetch_panel(config: &PollerConfig, name: &str) -> Result<Value> {
    let panel = config.panel(name)?;
    let client = DashboardApiClient::new(&config.api_base_url, config.request_timeout())?;
    Ok(client.get_json(&panel.path).await?)
}

fn log_event(event: &RefreshEvent<Value>) {
    match &event.state {
        RefreshState::Failed(reason) => {
            warn!(panel = %event.target, reason = %reason, "패널 갱신 실패");
        }
        RefreshState::Idle if event.payload.is_some() => {
            info!(panel = %event.target, "패널 갱신 완료");
        }
        state => {
            debug!(panel = %event.target, state = %state, "패널 상태 변경");
        }
    }
}

/// 선택한 패널을 종료 신호가 올 때까지 폴링합니다.
///
/// 모든 갱신 이벤트는 저장소에 반영되며, 종료 시 최종 상태를 반환합니다.
pub async fn watch(
    config: &PollerConfig,
    panels: Vec<PanelConfig>,
    shutdown: CancellationToken,
) -> Result<StoreState> {
    if config.summary_interval().is_zero() {
        return Err(PollerError::Config("상태 요약 주기는 0보다 커야 합니다".to_string()));
    }

    let client = DashboardApiClient::new(&config.api_base_url, config.request_timeout())?;
    let store = DashboardStore::new();
    let realtime = Arc::new(AtomicBool::new(config.realtime_mode));
    let (tx, mut events) = mpsc::unbounded_channel();

    let mut registry = RefreshRegistry::new();
    for panel in &panels {
        let target = build_target(&client, panel, Arc::clone(&realtime));
        registry.register(RefreshController::with_sender(target, tx.clone()))?;
    }
    drop(tx);

    registry.start_all()?;
    info!(
        panels = registry.len(),
        realtime = config.realtime_mode,
        api = %client.base_url(),
        "=== 대시보드 폴링 시작 ==="
    );

    let mut summary = tokio::time::interval(config.summary_interval());
    summary.set_missed_tick_behavior(MissedTickBehavior::Skip);
    summary.tick().await; // 첫 tick 건너뛰기

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("종료 신호 수신, 폴링 중지 중...");
                break;
            }
            Some(event) = events.recv() => {
                log_event(&event);
                store.apply_event(&event).await;
            }
            _ = summary.tick() => {
                let stale = store.stale_panels(Utc::now(), config.stale_after_secs).await;
                if stale.is_empty() {
                    info!(panels = registry.len(), "모든 패널 최신 상태");
                } else {
                    warn!(stale = ?stale, "오래된 패널 데이터");
                }
            }
        }
    }

    registry.stop_all();
    for (name, stats) in registry.stats() {
        stats.log_summary(&name);
    }

    Ok(store.snapshot().await)
}

/// 수집 작업을 요청하고 완료될 때까지 상태를 폴링합니다.
///
/// 저장소가 동시에 하나의 작업만 허용하므로, 다른 작업이 실행 중이면 요청하지
/// 않고 실패합니다.
pub async fn collect(
    config: &PollerConfig,
    store: &DashboardStore,
    job: &str,
) -> Result<JobStatus> {
    store
        .dispatch(StoreAction::JobStarted {
            job: job.to_string(),
        })
        .await?;

    let result = run_job(config, job).await;

    store
        .dispatch(StoreAction::JobFinished {
            job: job.to_string(),
        })
        .await?;

    result
}

async fn run_job(config: &PollerConfig, job: &str) -> Result<JobStatus> {
    let client = DashboardApiClient::new(&config.api_base_url, config.request_timeout())?;

    let _: Value = client
        .post_json(&config.job.trigger_path, &json!({ "job": job }))
        .await?;
    info!(job = job, "수집 작업 요청 완료");

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    let target = RefreshTarget::new(
        format!("job:{}", job),
        JsonEndpoint::new(client, config.job.status_path.clone()),
        config.job.poll_interval,
    )
    .with_liveness(move || flag.load(Ordering::SeqCst));

    let (controller, mut events) = RefreshController::new(target);
    controller.start()?;

    let mut last = JobStatus::default();
    while let Some(event) = events.recv().await {
        if let Some(payload) = event.payload {
            let status: JobStatus =
                serde_json::from_value(payload).map_err(|e| ApiError::Decode(e.to_string()))?;
            info!(
                job = job,
                progress = ?status.progress,
                message = ?status.message,
                "수집 진행 상황"
            );

            let finished = !status.running;
            last = status;
            if finished {
                running.store(false, Ordering::SeqCst);
                break;
            }
        } else if event.state.is_failed() {
            let failures = controller.stats().consecutive_failures;
            if failures >= config.job.max_failures {
                controller.stop();
                return Err(PollerError::Job(format!(
                    "{}: 상태 조회 {}회 연속 실패 ({})",
                    job,
                    failures,
                    event.state.failure_reason().unwrap_or_default()
                )));
            }
        }
    }

    controller.stop();
    controller.stats().log_summary(controller.name());
    info!(job = job, "수집 작업 완료");
    Ok(last)
}
