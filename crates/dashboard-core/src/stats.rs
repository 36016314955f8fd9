//! 대상별 갱신 통계.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 갱신 작업 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshStats {
    /// 총 조회 횟수
    pub total: usize,
    /// 성공 횟수
    pub success: usize,
    /// 실패 횟수
    pub errors: usize,
    /// 결과가 폐기된 횟수 (중지/비활성 이후 도착)
    pub discarded: usize,
    /// 조회 중이라 무시된 수동 갱신 횟수
    pub skipped_triggers: usize,
    /// 연속 실패 횟수
    pub consecutive_failures: usize,
    /// 마지막 성공 시각
    pub last_success_at: Option<DateTime<Utc>>,
    /// 마지막 실패 사유
    pub last_error: Option<String>,
    /// 마지막 조회 소요 시간
    #[serde(skip)]
    pub last_elapsed: Duration,
}

impl RefreshStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_success(&mut self, elapsed: Duration) {
        self.total += 1;
        self.success += 1;
        self.consecutive_failures = 0;
        self.last_success_at = Some(Utc::now());
        self.last_elapsed = elapsed;
    }

    pub(crate) fn record_failure(&mut self, reason: &str, elapsed: Duration) {
        self.total += 1;
        self.errors += 1;
        self.consecutive_failures += 1;
        self.last_error = Some(reason.to_string());
        self.last_elapsed = elapsed;
    }

    pub(crate) fn record_discard(&mut self, elapsed: Duration) {
        self.total += 1;
        self.discarded += 1;
        self.last_elapsed = elapsed;
    }

    /// 성공률 계산 (%). 폐기된 조회는 제외합니다.
    pub fn success_rate(&self) -> f64 {
        let settled = self.success + self.errors;
        if settled == 0 {
            0.0
        } else {
            (self.success as f64 / settled as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, target: &str) {
        tracing::info!(
            target_name = target,
            total = self.total,
            success = self.success,
            errors = self.errors,
            discarded = self.discarded,
            skipped_triggers = self.skipped_triggers,
            success_rate = format!("{:.1}%", self.success_rate()),
            last_elapsed = format!("{:.1}s", self.last_elapsed.as_secs_f64()),
            "갱신 통계"
        );
    }
}
