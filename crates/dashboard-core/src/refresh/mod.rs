//! 폴링 기반 데이터 갱신.
//!
//! 상태 패널, 실시간 히트맵, 급등 랭킹 등 여러 화면이 각자 구현하던
//! "지금 조회하고, 조건이 유지되는 동안 주기적으로 다시 조회하고, 화면이
//! 사라지면 멈춘다" 패턴을 하나의 컨트롤러로 제공합니다.

mod controller;
mod registry;
mod state;
mod target;

pub use controller::{RefreshController, TriggerOutcome};
pub use registry::{RefreshHandle, RefreshRegistry};
pub use state::{RefreshEvent, RefreshState};
pub use target::{RefreshSource, RefreshTarget};
