//! Market monitor dashboard poller.
//!
//! 대시보드 패널 데이터를 백엔드 API에서 주기적으로 조회합니다:
//! - 환경변수 기반 설정 (API 주소, 패널별 주기)
//! - REST 클라이언트 및 패널별 조회 소스
//! - 패널 폴링 (`watch`), 단발 조회 (`once`), 수집 작업 실행 (`collect`)

pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod panels;

pub use client::{DashboardApiClient, JsonEndpoint};
pub use config::{JobConfig, PanelConfig, PollerConfig};
pub use error::{ApiError, PollerError, Result};
pub use panels::{build_target, default_panels, JobStatus};
