//! 폴링 대상 정의.
//!
//! `RefreshTarget`은 조회 함수, 주기, 활성 조건(liveness)을 묶습니다.
//! 조회 함수는 `RefreshSource`를 구현한 타입이나
//! `Fn() -> impl Future<Output = Result<T, FetchError>>` 클로저면 됩니다.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{FetchError, RefreshError, RefreshResult};

/// 단일 조회를 수행하는 데이터 소스.
#[async_trait]
pub trait RefreshSource<T: Send + 'static>: Send + Sync {
    /// 최신 데이터를 조회합니다.
    async fn fetch(&self) -> Result<T, FetchError>;
}

#[async_trait]
impl<T, F, Fut> RefreshSource<T> for F
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
{
    async fn fetch(&self) -> Result<T, FetchError> {
        (self)().await
    }
}

type Liveness = Arc<dyn Fn() -> bool + Send + Sync>;

/// 폴링 대상.
pub struct RefreshTarget<T: Send + 'static> {
    name: String,
    source: Arc<dyn RefreshSource<T>>,
    interval: Duration,
    liveness: Liveness,
}

impl<T: Send + 'static> Clone for RefreshTarget<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            source: Arc::clone(&self.source),
            interval: self.interval,
            liveness: Arc::clone(&self.liveness),
        }
    }
}

impl<T: Send + 'static> std::fmt::Debug for RefreshTarget<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshTarget")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> RefreshTarget<T> {
    /// 항상 활성 상태인 대상을 생성합니다.
    pub fn new(
        name: impl Into<String>,
        source: impl RefreshSource<T> + 'static,
        interval: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            source: Arc::new(source),
            interval,
            liveness: Arc::new(|| true),
        }
    }

    /// 이미 공유 중인 소스로 대상을 생성합니다.
    pub fn from_shared(
        name: impl Into<String>,
        source: Arc<dyn RefreshSource<T>>,
        interval: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            interval,
            liveness: Arc::new(|| true),
        }
    }

    /// 활성 조건을 지정합니다 (예: "작업이 아직 실행 중", "실시간 모드").
    pub fn with_liveness(mut self, liveness: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.liveness = Arc::new(liveness);
        self
    }

    /// 대상 이름.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 폴링 주기.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 현재 활성 조건을 평가합니다.
    pub fn is_live(&self) -> bool {
        (self.liveness)()
    }

    /// 조회를 실행합니다.
    pub async fn fetch(&self) -> Result<T, FetchError> {
        self.source.fetch().await
    }

    /// 설정을 검증합니다. 잘못된 값은 기본값으로 대체하지 않습니다.
    pub fn validate(&self) -> RefreshResult<()> {
        if self.name.trim().is_empty() {
            return Err(RefreshError::Config("대상 이름이 비어 있습니다".to_string()));
        }
        if self.interval.is_zero() {
            return Err(RefreshError::Config(format!(
                "{}: 폴링 주기는 0보다 커야 합니다",
                self.name
            )));
        }
        Ok(())
    }
}
