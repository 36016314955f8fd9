//! 폴링 갱신 컨트롤러.
//!
//! 대상 하나를 즉시 조회한 뒤, 조회가 끝난 시점(settle)부터 주기만큼 기다려
//! 다시 조회합니다. 조회가 주기보다 오래 걸려도 요청이 겹치지 않습니다.
//!
//! # 보장
//!
//! - 대상별 동시 조회는 최대 1개 (중지 후 재시작 포함)
//! - `stop()` 이후 도착한 결과는 적용되지 않음 (진행 중인 요청 자체는 취소하지 않음)
//! - 활성 조건이 false가 되면 늦게 도착한 결과를 버리고 폴링 종료
//! - 조회 실패는 `Failed` 상태로만 보고되고 폴링은 계속됨 (고정 주기 재시도)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::state::{RefreshEvent, RefreshState};
use super::target::RefreshTarget;
use crate::error::{RefreshError, RefreshResult};
use crate::stats::RefreshStats;

/// 수동 갱신 요청 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// 즉시 조회 예약됨 (이후 주기는 이 조회 완료 시점부터 다시 계산)
    Scheduled,
    /// 이미 조회 중이라 무시됨
    AlreadyInFlight,
    /// 폴링 중이 아니라 무시됨
    NotRunning,
}

/// 단일 조회 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchOutcome {
    Applied,
    Failed,
    Discarded,
    Busy,
}

/// 폴링 task와 컨트롤러가 공유하는 상태.
struct Shared<T: Send + 'static> {
    name: String,
    /// 결과를 적용해도 되는지 ("still wanted")
    active: AtomicBool,
    in_flight: watch::Sender<bool>,
    /// 아직 처리되지 않은 수동 갱신 요청 (다음 조회가 시작되면 해제)
    pending_trigger: AtomicBool,
    state: watch::Sender<RefreshState>,
    events: mpsc::UnboundedSender<RefreshEvent<T>>,
    next_due: Mutex<Option<Instant>>,
    stats: Mutex<RefreshStats>,
}

impl<T: Send + 'static> Shared<T> {
    fn try_begin(&self) -> bool {
        self.in_flight.send_if_modified(|busy| {
            if *busy {
                false
            } else {
                *busy = true;
                true
            }
        })
    }

    fn is_in_flight(&self) -> bool {
        *self.in_flight.borrow()
    }

    /// 대기 없이 바로 조회할 차례인지 확인합니다 (첫 조회 또는 일정 경과).
    fn is_fetch_due(&self) -> bool {
        !matches!(self.next_due(), Some(due) if due > Instant::now())
    }

    fn stats(&self) -> MutexGuard<'_, RefreshStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_due(&self) -> Option<Instant> {
        *self.next_due.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_next_due(&self, due: Instant) {
        *self.next_due.lock().unwrap_or_else(PoisonError::into_inner) = Some(due);
    }

    fn transition(&self, next: RefreshState, payload: Option<T>) {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next.clone();
                true
            }
        });

        if changed || payload.is_some() {
            // 수신자가 없으면 무시
            let _ = self.events.send(RefreshEvent::new(&self.name, next, payload));
        }
    }

    /// 진행 중인 조회가 끝날 때까지 대기합니다. 취소되면 false.
    async fn wait_settled(&self, token: &CancellationToken) -> bool {
        let mut rx = self.in_flight.subscribe();
        tokio::select! {
            _ = token.cancelled() => false,
            settled = async { rx.wait_for(|busy| !*busy).await.is_ok() } => settled,
        }
    }

    async fn fetch_once(&self, target: &RefreshTarget<T>) -> FetchOutcome {
        if !self.try_begin() {
            return FetchOutcome::Busy;
        }
        self.pending_trigger.store(false, Ordering::SeqCst);

        let was_failed = self.state.borrow().is_failed();
        if was_failed {
            self.transition(RefreshState::Idle, None);
        }
        self.transition(RefreshState::InFlight, None);

        let started = Instant::now();
        let result = target.fetch().await;
        let elapsed = started.elapsed();

        let outcome = if !self.active.load(Ordering::SeqCst) || !target.is_live() {
            debug!(
                target_name = %self.name,
                elapsed_ms = elapsed.as_millis() as u64,
                "더 이상 필요하지 않은 조회 결과 폐기"
            );
            self.stats().record_discard(elapsed);
            FetchOutcome::Discarded
        } else {
            match result {
                Ok(payload) => {
                    self.stats().record_success(elapsed);
                    self.transition(RefreshState::Idle, Some(payload));
                    FetchOutcome::Applied
                }
                Err(e) => {
                    let reason = e.to_string();
                    if e.is_transient() {
                        warn!(
                            target_name = %self.name,
                            error = %reason,
                            "조회 실패, 다음 주기에 재시도"
                        );
                    } else {
                        error!(
                            target_name = %self.name,
                            error = %reason,
                            "조회 실패 (일시적 오류 아님), 다음 주기에 재시도"
                        );
                    }
                    self.stats().record_failure(&reason, elapsed);
                    self.transition(RefreshState::Failed(reason), None);
                    FetchOutcome::Failed
                }
            }
        };

        self.set_next_due(Instant::now() + target.interval());
        self.in_flight.send_replace(false);
        outcome
    }
}

/// 폴링 루프.
///
/// 다음 조회 예정 시각(`next_due`)은 컨트롤러에 남아 있으므로 중지 후 바로
/// 재시작해도 일정이 이어집니다.
async fn run_loop<T: Send + 'static>(
    shared: Arc<Shared<T>>,
    target: RefreshTarget<T>,
    token: CancellationToken,
    wake: Arc<Notify>,
) {
    info!(
        target_name = %shared.name,
        interval_ms = target.interval().as_millis() as u64,
        "폴링 시작"
    );

    loop {
        // 이전 세대의 조회가 아직 진행 중이면 그 결과를 기다림
        if !shared.wait_settled(&token).await {
            break;
        }

        if let Some(due) = shared.next_due().filter(|due| *due > Instant::now()) {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep_until(due) => {}
                _ = wake.notified() => {
                    // 이미 다른 조회가 처리한 요청이면 일정대로 다시 대기
                    if !shared.pending_trigger.load(Ordering::SeqCst) {
                        continue;
                    }
                    debug!(target_name = %shared.name, "수동 갱신 요청");
                }
            }
        }

        if token.is_cancelled() {
            break;
        }
        if !target.is_live() {
            info!(target_name = %shared.name, "활성 조건 해제, 폴링 종료");
            break;
        }

        match shared.fetch_once(&target).await {
            FetchOutcome::Busy => continue,
            FetchOutcome::Discarded if !target.is_live() => {
                info!(target_name = %shared.name, "활성 조건 해제, 폴링 종료");
                break;
            }
            _ => {}
        }

        if token.is_cancelled() {
            break;
        }
    }

    debug!(target_name = %shared.name, "폴링 루프 종료");
}

/// 실행 중인 폴링 task 핸들.
struct Running {
    token: CancellationToken,
    wake: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl Running {
    fn is_alive(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// 대상 하나의 폴링을 관리하는 컨트롤러.
///
/// 컨트롤러가 drop되면 폴링도 중지됩니다.
pub struct RefreshController<T: Send + 'static> {
    target: RefreshTarget<T>,
    shared: Arc<Shared<T>>,
    running: Mutex<Option<Running>>,
}

impl<T: Send + 'static> RefreshController<T> {
    /// 새 컨트롤러와 이벤트 수신자를 생성합니다.
    pub fn new(target: RefreshTarget<T>) -> (Self, mpsc::UnboundedReceiver<RefreshEvent<T>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::with_sender(target, tx), rx)
    }

    /// 기존 이벤트 채널을 공유하는 컨트롤러를 생성합니다.
    pub fn with_sender(
        target: RefreshTarget<T>,
        events: mpsc::UnboundedSender<RefreshEvent<T>>,
    ) -> Self {
        let (in_flight, _) = watch::channel(false);
        let (state, _) = watch::channel(RefreshState::Idle);

        let shared = Shared {
            name: target.name().to_string(),
            active: AtomicBool::new(false),
            in_flight,
            pending_trigger: AtomicBool::new(false),
            state,
            events,
            next_due: Mutex::new(None),
            stats: Mutex::new(RefreshStats::new()),
        };

        Self {
            target,
            shared: Arc::new(shared),
            running: Mutex::new(None),
        }
    }

    fn running(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 대상 이름.
    pub fn name(&self) -> &str {
        self.target.name()
    }

    /// 폴링을 시작합니다.
    ///
    /// 처음 시작하면 즉시 조회합니다. 중지 직후 재시작하면 기존 일정을 이어가며,
    /// 진행 중인 조회가 있으면 새로 조회하지 않고 그 결과를 사용합니다.
    pub fn start(&self) -> RefreshResult<()> {
        self.target.validate()?;

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| RefreshError::Runtime(format!("{}: {}", self.name(), e)))?;

        let mut running = self.running();
        if running.as_ref().is_some_and(Running::is_alive) {
            return Err(RefreshError::AlreadyStarted(self.name().to_string()));
        }

        self.shared.active.store(true, Ordering::SeqCst);
        self.shared.pending_trigger.store(false, Ordering::SeqCst);

        let token = CancellationToken::new();
        let wake = Arc::new(Notify::new());
        let handle = runtime.spawn(run_loop(
            Arc::clone(&self.shared),
            self.target.clone(),
            token.clone(),
            Arc::clone(&wake),
        ));

        *running = Some(Running {
            token,
            wake,
            handle,
        });
        Ok(())
    }

    /// 폴링을 중지합니다.
    ///
    /// 예약된 조회는 취소되고, 진행 중인 조회는 끝까지 실행되지만 그 결과는
    /// 적용되지 않습니다 (결과 도착 전 재시작한 경우 제외).
    pub fn stop(&self) {
        self.shared.active.store(false, Ordering::SeqCst);

        if let Some(running) = self.running().take() {
            running.token.cancel();
            info!(target_name = %self.name(), "폴링 중지");
        }
    }

    /// 수동 갱신.
    ///
    /// 조회가 진행 중이거나 곧 시작될 예정이면(시작 직후, 일정 경과 후 재시작)
    /// 추가 조회 없이 `AlreadyInFlight`를 반환합니다.
    pub fn trigger(&self) -> TriggerOutcome {
        let guard = self.running();
        let Some(running) = guard.as_ref().filter(|r| r.is_alive()) else {
            return TriggerOutcome::NotRunning;
        };

        if self.shared.is_in_flight() || self.shared.is_fetch_due() {
            self.shared.stats().skipped_triggers += 1;
            debug!(target_name = %self.name(), "이미 조회 중, 수동 갱신 무시");
            return TriggerOutcome::AlreadyInFlight;
        }

        self.shared.pending_trigger.store(true, Ordering::SeqCst);
        running.wake.notify_one();
        TriggerOutcome::Scheduled
    }

    /// 현재 상태.
    pub fn state(&self) -> RefreshState {
        self.shared.state.borrow().clone()
    }

    /// 상태 변경 구독.
    pub fn subscribe_state(&self) -> watch::Receiver<RefreshState> {
        self.shared.state.subscribe()
    }

    /// 폴링 task가 살아 있는지 확인합니다.
    pub fn is_running(&self) -> bool {
        self.running().as_ref().is_some_and(Running::is_alive)
    }

    /// 조회가 진행 중인지 확인합니다.
    pub fn is_in_flight(&self) -> bool {
        self.shared.is_in_flight()
    }

    /// 통계 스냅샷.
    pub fn stats(&self) -> RefreshStats {
        self.shared.stats().clone()
    }
}

impl<T: Send + 'static> Drop for RefreshController<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn counting_target(
        interval: Duration,
        delay: Duration,
    ) -> (RefreshTarget<usize>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let target = RefreshTarget::new(
            "scheduler-status",
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    tokio::time::sleep(delay).await;
                    Ok::<_, FetchError>(n)
                }
            },
            interval,
        );
        (target, calls)
    }

    #[tokio::test]
    async fn test_start_rejects_zero_interval() {
        let (target, calls) = counting_target(Duration::ZERO, Duration::ZERO);
        let (controller, _events) = RefreshController::new(target);

        assert!(matches!(controller.start(), Err(RefreshError::Config(_))));
        assert!(!controller.is_running());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_start_outside_runtime() {
        let (target, _) = counting_target(Duration::from_secs(1), Duration::ZERO);
        let (controller, _events) = RefreshController::new(target);

        assert!(matches!(controller.start(), Err(RefreshError::Runtime(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_is_rejected() {
        let (target, _) = counting_target(Duration::from_secs(30), Duration::ZERO);
        let (controller, _events) = RefreshController::new(target);

        controller.start().unwrap();
        assert_eq!(
            controller.start(),
            Err(RefreshError::AlreadyStarted("scheduler-status".to_string()))
        );
        controller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_when_not_running() {
        let (target, calls) = counting_target(Duration::from_secs(30), Duration::ZERO);
        let (controller, _events) = RefreshController::new(target);

        assert_eq!(controller.trigger(), TriggerOutcome::NotRunning);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_polling() {
        let (target, calls) = counting_target(Duration::from_secs(1), Duration::ZERO);
        let (controller, _events) = RefreshController::new(target);

        controller.start().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        drop(controller);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_trigger_resets_schedule() {
        let (target, calls) = counting_target(Duration::from_secs(10), Duration::ZERO);
        let (controller, _events) = RefreshController::new(target);

        controller.start().unwrap();
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert_eq!(controller.trigger(), TriggerOutcome::Scheduled);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // 원래 일정(10초)이 아니라 수동 갱신 시점(4초) + 10초 = 14초
        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        controller.stop();
    }
}
