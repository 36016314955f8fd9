//! 환경변수 기반 설정 모듈.

use std::time::Duration;

use crate::error::PollerError;
use crate::panels::default_panels;
use crate::Result;

/// Poller 전체 설정
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// 백엔드 API 주소
    pub api_base_url: String,
    /// 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// 실시간 모드 (실시간 전용 패널 폴링 여부)
    pub realtime_mode: bool,
    /// 데이터 만료 기준 (초)
    pub stale_after_secs: i64,
    /// 상태 요약 출력 주기 (초)
    pub summary_interval_secs: u64,
    /// 패널 목록
    pub panels: Vec<PanelConfig>,
    /// 수집 작업 설정
    pub job: JobConfig,
}

/// 패널(폴링 대상) 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelConfig {
    /// 패널 이름
    pub name: String,
    /// API 경로
    pub path: String,
    /// 폴링 주기
    pub interval: Duration,
    /// 실시간 모드에서만 폴링
    pub realtime_only: bool,
}

/// 수집 작업 설정
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// 작업 요청 경로 (POST)
    pub trigger_path: String,
    /// 작업 상태 경로 (GET)
    pub status_path: String,
    /// 상태 폴링 주기
    pub poll_interval: Duration,
    /// 연속 실패 허용 횟수
    pub max_failures: usize,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            trigger_path: "/api/v1/dataset/collect".to_string(),
            status_path: "/api/v1/dataset/collect/status".to_string(),
            poll_interval: Duration::from_secs(3),
            max_failures: 5,
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000".to_string(),
            request_timeout_secs: 10,
            realtime_mode: true,
            stale_after_secs: 300,
            summary_interval_secs: 60,
            panels: default_panels(),
            job: JobConfig::default(),
        }
    }
}

impl PollerConfig {
    /// 환경변수에서 설정 로드 (`.env` 포함)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 주어진 조회 함수로 설정을 구성합니다.
    ///
    /// 값이 없으면 기본값을 사용하고, 값이 있지만 파싱할 수 없으면 에러를 반환합니다.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let api_base_url = lookup("DASHBOARD_API_URL").unwrap_or(defaults.api_base_url);
        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(PollerError::Config(format!(
                "DASHBOARD_API_URL은 http(s) 주소여야 합니다: {}",
                api_base_url
            )));
        }

        let mut panels = defaults.panels;
        for panel in &mut panels {
            let key = format!("PANEL_{}_INTERVAL_SECS", env_key(&panel.name));
            let secs = env_var_positive(&lookup, &key, panel.interval.as_secs())?;
            panel.interval = Duration::from_secs(secs);
        }

        let job = JobConfig {
            trigger_path: lookup("JOB_TRIGGER_PATH").unwrap_or(defaults.job.trigger_path),
            status_path: lookup("JOB_STATUS_PATH").unwrap_or(defaults.job.status_path),
            poll_interval: Duration::from_secs(env_var_positive(
                &lookup,
                "JOB_POLL_INTERVAL_SECS",
                defaults.job.poll_interval.as_secs(),
            )?),
            max_failures: env_var_positive(
                &lookup,
                "JOB_MAX_FAILURES",
                defaults.job.max_failures,
            )?,
        };

        Ok(Self {
            api_base_url,
            request_timeout_secs: env_var_positive(
                &lookup,
                "DASHBOARD_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            )?,
            realtime_mode: env_var_bool(
                &lookup,
                "DASHBOARD_REALTIME_MODE",
                defaults.realtime_mode,
            )?,
            stale_after_secs: env_var_positive(
                &lookup,
                "DASHBOARD_STALE_AFTER_SECS",
                defaults.stale_after_secs,
            )?,
            summary_interval_secs: env_var_positive(
                &lookup,
                "DASHBOARD_SUMMARY_INTERVAL_SECS",
                defaults.summary_interval_secs,
            )?,
            panels,
            job,
        })
    }

    /// 요청 타임아웃을 Duration으로 반환
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// 상태 요약 주기를 Duration으로 반환
    pub fn summary_interval(&self) -> Duration {
        Duration::from_secs(self.summary_interval_secs)
    }

    /// 이름으로 패널 설정 조회
    pub fn panel(&self, name: &str) -> Result<&PanelConfig> {
        self.panels
            .iter()
            .find(|panel| panel.name == name)
            .ok_or_else(|| PollerError::Config(format!("알 수 없는 패널: {}", name)))
    }

    /// 쉼표로 구분된 패널 이름으로 선택 (None이면 전체)
    pub fn select_panels(&self, names: Option<&str>) -> Result<Vec<PanelConfig>> {
        match names {
            None => Ok(self.panels.clone()),
            Some(names) => names
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(|name| self.panel(name).cloned())
                .collect(),
        }
    }
}

/// 패널 이름을 환경변수 키 형식으로 변환 (`etf-rotation` → `ETF_ROTATION`)
fn env_key(name: &str) -> String {
    name.to_uppercase().replace('-', "_")
}

/// 환경변수에서 값을 파싱 (없으면 기본값, 잘못된 값이면 에러)
fn env_var_parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| PollerError::Config(format!("{} 값이 올바르지 않습니다: {}", key, value))),
    }
}

/// 환경변수에서 0보다 큰 값 파싱 (주기, 타임아웃, 횟수)
fn env_var_positive<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T>
where
    T: std::str::FromStr + Default + PartialOrd,
{
    let value = env_var_parse(lookup, key, default)?;
    if value <= T::default() {
        return Err(PollerError::Config(format!("{}는 0보다 커야 합니다", key)));
    }
    Ok(value)
}

/// 환경변수에서 bool 값 파싱 (`true`/`false`/`1`/`0`, 대소문자 무시)
fn env_var_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: bool,
) -> Result<bool> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(PollerError::Config(format!("{} 값이 올바르지 않습니다: {}", key, value))),
        },
    }
}
