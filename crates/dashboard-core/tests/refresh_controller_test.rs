//! RefreshController 통합 테스트
//!
//! 가상 시간(`start_paused`)으로 주기/지연을 결정적으로 검증합니다.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashboard_core::{
    FetchError, RefreshController, RefreshEvent, RefreshSource, RefreshState, RefreshTarget,
    TriggerOutcome,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep, Instant};

/// 미리 정한 결과를 순서대로 반환하는 테스트용 소스
struct ScriptedSource {
    script: Mutex<VecDeque<Result<u32, FetchError>>>,
    delay: Duration,
    starts: Mutex<Vec<Instant>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedSource {
    fn new(delay: Duration) -> Arc<Self> {
        Self::with_script(delay, Vec::new())
    }

    fn with_script(delay: Duration, script: Vec<Result<u32, FetchError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            delay,
            starts: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.starts.lock().unwrap().len()
    }

    fn starts(&self) -> Vec<Instant> {
        self.starts.lock().unwrap().clone()
    }
}

#[async_trait]
impl RefreshSource<u32> for ScriptedSource {
    async fn fetch(&self) -> Result<u32, FetchError> {
        self.starts.lock().unwrap().push(Instant::now());
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        sleep(self.delay).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or(Ok(0))
    }
}

fn target(name: &str, source: &Arc<ScriptedSource>, interval: Duration) -> RefreshTarget<u32> {
    let source: Arc<dyn RefreshSource<u32>> = Arc::<ScriptedSource>::clone(source);
    RefreshTarget::from_shared(name, source, interval)
}

fn drain(events: &mut UnboundedReceiver<RefreshEvent<u32>>) -> Vec<RefreshEvent<u32>> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test(start_paused = true)]
async fn test_slow_fetch_does_not_pile_up() {
    let source = ScriptedSource::new(Duration::from_millis(1500));
    let (controller, _events) =
        RefreshController::new(target("slow", &source, Duration::from_millis(1000)));

    controller.start().unwrap();
    sleep(Duration::from_millis(6000)).await;
    controller.stop();

    let starts = source.starts();
    assert_eq!(starts.len(), 3, "0ms, 2500ms, 5000ms에 시작해야 함");
    assert!(starts[1] - starts[0] >= Duration::from_millis(2500));
    assert!(starts[2] - starts[1] >= Duration::from_millis(2500));
    assert_eq!(source.max_active.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failures_do_not_stop_polling() {
    let source = ScriptedSource::with_script(
        Duration::ZERO,
        vec![
            Err(FetchError::Network("connection reset".to_string())),
            Err(FetchError::Status {
                code: 503,
                message: "unavailable".to_string(),
            }),
            Ok(42),
        ],
    );
    let (controller, mut events) =
        RefreshController::new(target("data-status", &source, Duration::from_secs(1)));

    controller.start().unwrap();
    sleep(Duration::from_millis(2500)).await;
    assert!(controller.is_running());
    controller.stop();

    let events = drain(&mut events);
    let mut states = vec![RefreshState::Idle];
    states.extend(events.iter().map(|e| e.state.clone()));

    assert_eq!(
        states,
        vec![
            RefreshState::Idle,
            RefreshState::InFlight,
            RefreshState::Failed("네트워크 에러: connection reset".to_string()),
            RefreshState::Idle,
            RefreshState::InFlight,
            RefreshState::Failed("HTTP 503: unavailable".to_string()),
            RefreshState::Idle,
            RefreshState::InFlight,
            RefreshState::Idle,
        ]
    );
    assert_eq!(events.last().and_then(|e| e.payload), Some(42));
    assert!(events[..events.len() - 1].iter().all(|e| e.payload.is_none()));

    let stats = controller.stats();
    assert_eq!(stats.errors, 2);
    assert_eq!(stats.success, 1);
    assert_eq!(stats.consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_permanent_error_keeps_polling() {
    let source = ScriptedSource::with_script(
        Duration::ZERO,
        vec![
            Err(FetchError::Status {
                code: 404,
                message: "not found".to_string(),
            }),
            Ok(5),
        ],
    );
    let (controller, mut events) =
        RefreshController::new(target("sector-flow", &source, Duration::from_secs(5)));

    controller.start().unwrap();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(
        controller.state(),
        RefreshState::Failed("HTTP 404: not found".to_string())
    );

    sleep(Duration::from_secs(5)).await;
    assert_eq!(source.calls(), 2);
    assert_eq!(controller.state(), RefreshState::Idle);
    let events = drain(&mut events);
    assert_eq!(events.last().and_then(|e| e.payload), Some(5));
    controller.stop();
}

#[tokio::test(start_paused = true)]
async fn test_trigger_while_in_flight_is_noop() {
    let source = ScriptedSource::new(Duration::from_secs(1));
    let (controller, _events) =
        RefreshController::new(target("spike-ranking", &source, Duration::from_secs(30)));

    controller.start().unwrap();
    sleep(Duration::from_millis(100)).await;
    assert!(controller.is_in_flight());

    assert_eq!(controller.trigger(), TriggerOutcome::AlreadyInFlight);
    sleep(Duration::from_millis(1500)).await;

    assert_eq!(source.calls(), 1);
    assert_eq!(controller.stats().skipped_triggers, 1);
    controller.stop();
}

#[tokio::test(start_paused = true)]
async fn test_trigger_right_after_start_does_not_fetch_twice() {
    let source = ScriptedSource::new(Duration::from_secs(1));
    let (controller, _events) =
        RefreshController::new(target("scheduler-status", &source, Duration::from_secs(30)));

    controller.start().unwrap();
    assert_eq!(controller.trigger(), TriggerOutcome::AlreadyInFlight);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(source.calls(), 1);

    // 일정은 첫 조회 완료(1초) + 30초 그대로
    sleep(Duration::from_secs(25)).await;
    assert_eq!(source.calls(), 1);
    sleep(Duration::from_secs(2)).await;
    assert_eq!(source.calls(), 2);
    controller.stop();
}

#[tokio::test(start_paused = true)]
async fn test_trigger_after_overdue_restart_fetches_once() {
    let source = ScriptedSource::new(Duration::ZERO);
    let (controller, _events) =
        RefreshController::new(target("data-status", &source, Duration::from_secs(10)));

    controller.start().unwrap();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(source.calls(), 1);

    controller.stop();
    sleep(Duration::from_secs(15)).await;

    controller.start().unwrap();
    assert_eq!(controller.trigger(), TriggerOutcome::AlreadyInFlight);
    sleep(Duration::from_secs(1)).await;
    assert_eq!(source.calls(), 2);

    // 재시작 조회(16초) + 10초 전에는 추가 조회 없음
    sleep(Duration::from_secs(8)).await;
    assert_eq!(source.calls(), 2);
    sleep(Duration::from_secs(2)).await;
    assert_eq!(source.calls(), 3);
    controller.stop();
}

#[tokio::test(start_paused = true)]
async fn test_stop_discards_in_flight_result() {
    let source = ScriptedSource::new(Duration::from_secs(2));
    let (controller, mut events) =
        RefreshController::new(target("scheduler-status", &source, Duration::from_secs(30)));

    controller.start().unwrap();
    sleep(Duration::from_secs(1)).await;
    controller.stop();
    sleep(Duration::from_secs(5)).await;

    let events = drain(&mut events);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].state, RefreshState::InFlight);
    assert!(!controller.is_in_flight());
    assert_eq!(controller.stats().discarded, 1);
    assert_eq!(source.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_liveness_lost_mid_flight_discards_result() {
    let live = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&live);
    let source = ScriptedSource::new(Duration::from_secs(2));
    let (controller, mut events) = RefreshController::new(
        target("etf-rotation", &source, Duration::from_secs(1))
            .with_liveness(move || flag.load(Ordering::SeqCst)),
    );

    controller.start().unwrap();
    sleep(Duration::from_secs(1)).await;
    live.store(false, Ordering::SeqCst);
    sleep(Duration::from_secs(5)).await;

    let events = drain(&mut events);
    assert!(events.iter().all(|e| e.payload.is_none()));
    assert_eq!(controller.state(), RefreshState::InFlight);
    assert_eq!(controller.stats().discarded, 1);
    assert_eq!(source.calls(), 1);
    assert!(!controller.is_running(), "활성 조건이 해제되면 폴링이 끝나야 함");
}

#[tokio::test(start_paused = true)]
async fn test_restart_while_in_flight_adopts_fetch() {
    let source = ScriptedSource::with_script(Duration::from_secs(2), vec![Ok(7)]);
    let (controller, mut events) =
        RefreshController::new(target("data-status", &source, Duration::from_secs(10)));

    controller.start().unwrap();
    sleep(Duration::from_millis(500)).await;
    controller.stop();
    controller.start().unwrap();

    sleep(Duration::from_secs(2)).await;
    assert_eq!(source.calls(), 1, "재시작 시 즉시 재조회하면 안 됨");
    let events = drain(&mut events);
    assert_eq!(events.last().and_then(|e| e.payload), Some(7));

    // 첫 조회 완료(2초) + 주기(10초)
    sleep(Duration::from_secs(9)).await;
    assert_eq!(source.calls(), 1);
    sleep(Duration::from_secs(1)).await;
    assert_eq!(source.calls(), 2);
    assert_eq!(source.max_active.load(Ordering::SeqCst), 1);
    controller.stop();
}

#[tokio::test(start_paused = true)]
async fn test_restart_while_waiting_keeps_schedule() {
    let continuous = ScriptedSource::new(Duration::ZERO);
    let restarted = ScriptedSource::new(Duration::ZERO);
    let (a, _a_events) =
        RefreshController::new(target("continuous", &continuous, Duration::from_secs(10)));
    let (b, _b_events) =
        RefreshController::new(target("restarted", &restarted, Duration::from_secs(10)));

    a.start().unwrap();
    b.start().unwrap();
    sleep(Duration::from_secs(3)).await;

    b.stop();
    b.start().unwrap();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(restarted.calls(), 1);

    sleep(Duration::from_secs(18)).await;
    assert_eq!(continuous.calls(), 3);
    assert_eq!(restarted.calls(), 3);

    let a_starts = continuous.starts();
    let b_starts = restarted.starts();
    for (x, y) in a_starts.iter().zip(b_starts.iter()) {
        assert_eq!(*x, *y);
    }

    a.stop();
    b.stop();
}

#[tokio::test(start_paused = true)]
async fn test_independent_cadences() {
    let scheduler = ScriptedSource::new(Duration::ZERO);
    let market = ScriptedSource::new(Duration::from_millis(400));
    let (fast, _fast_events) =
        RefreshController::new(target("scheduler-status", &scheduler, Duration::from_secs(1)));
    let (slow, _slow_events) =
        RefreshController::new(target("data-status", &market, Duration::from_secs(3)));

    fast.start().unwrap();
    slow.start().unwrap();
    sleep(Duration::from_millis(6500)).await;

    // 0..=6초 매초 / 0, 3.4, 6.8초 중 6.5초 이전은 2회
    assert_eq!(scheduler.calls(), 7);
    assert_eq!(market.calls(), 2);

    slow.stop();
    sleep(Duration::from_secs(2)).await;
    assert_eq!(scheduler.calls(), 9);
    assert_eq!(market.calls(), 2);
    fast.stop();
}
