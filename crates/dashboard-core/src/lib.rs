//! # Dashboard Core
//!
//! 시장 모니터링 대시보드의 데이터 갱신 핵심 기능을 제공합니다:
//! - 폴링 갱신 컨트롤러 (조회 완료 후 대기, 중복 조회 방지, 늦은 결과 폐기)
//! - 여러 대상을 독립 주기로 관리하는 레지스트리
//! - 액션 기반 대시보드 상태 저장소
//! - 갱신 통계
//! - 로깅 인프라

pub mod error;
pub mod logging;
pub mod refresh;
pub mod stats;
pub mod store;

pub use error::{FetchError, RefreshError, RefreshResult};
pub use logging::{init_logging, LogConfig, LogFormat};
pub use refresh::{
    RefreshController, RefreshEvent, RefreshHandle, RefreshRegistry, RefreshSource,
    RefreshState, RefreshTarget, TriggerOutcome,
};
pub use stats::RefreshStats;
pub use store::{DashboardStore, PanelSnapshot, StoreAction, StoreError, StoreState};
