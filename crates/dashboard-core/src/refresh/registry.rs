//! 여러 폴링 대상을 이름으로 관리하는 레지스트리.
//!
//! 화면(패널)이 활성화될 때 대상을 등록하고, 사라질 때 해제합니다.
//! 해제하면 예약된 조회가 함께 취소되므로 소비자 없이 남는 타이머가 없습니다.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::controller::{RefreshController, TriggerOutcome};
use super::state::RefreshState;
use crate::error::{RefreshError, RefreshResult};
use crate::stats::RefreshStats;

/// 타입이 지워진 폴링 대상 핸들.
pub trait RefreshHandle: Send + Sync {
    /// 대상 이름
    fn name(&self) -> &str;
    /// 폴링 시작
    fn start(&self) -> RefreshResult<()>;
    /// 폴링 중지
    fn stop(&self);
    /// 수동 갱신
    fn trigger(&self) -> TriggerOutcome;
    /// 현재 상태
    fn state(&self) -> RefreshState;
    /// 폴링 task 생존 여부
    fn is_running(&self) -> bool;
    /// 통계 스냅샷
    fn stats(&self) -> RefreshStats;
}

impl<T: Send + 'static> RefreshHandle for RefreshController<T> {
    fn name(&self) -> &str {
        RefreshController::name(self)
    }

    fn start(&self) -> RefreshResult<()> {
        RefreshController::start(self)
    }

    fn stop(&self) {
        RefreshController::stop(self)
    }

    fn trigger(&self) -> TriggerOutcome {
        RefreshController::trigger(self)
    }

    fn state(&self) -> RefreshState {
        RefreshController::state(self)
    }

    fn is_running(&self) -> bool {
        RefreshController::is_running(self)
    }

    fn stats(&self) -> RefreshStats {
        RefreshController::stats(self)
    }
}

impl<H: RefreshHandle + ?Sized> RefreshHandle for Arc<H> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn start(&self) -> RefreshResult<()> {
        (**self).start()
    }

    fn stop(&self) {
        (**self).stop()
    }

    fn trigger(&self) -> TriggerOutcome {
        (**self).trigger()
    }

    fn state(&self) -> RefreshState {
        (**self).state()
    }

    fn is_running(&self) -> bool {
        (**self).is_running()
    }

    fn stats(&self) -> RefreshStats {
        (**self).stats()
    }
}

/// 이름 기반 폴링 대상 레지스트리.
#[derive(Default)]
pub struct RefreshRegistry {
    handles: BTreeMap<String, Box<dyn RefreshHandle>>,
}

impl RefreshRegistry {
    /// 빈 레지스트리 생성.
    pub fn new() -> Self {
        Self::default()
    }

    /// 대상을 등록합니다. 같은 이름이 있으면 실패합니다.
    pub fn register(&mut self, handle: impl RefreshHandle + 'static) -> RefreshResult<()> {
        let name = handle.name().to_string();
        if self.handles.contains_key(&name) {
            return Err(RefreshError::Duplicate(name));
        }
        tracing::debug!(target_name = %name, "폴링 대상 등록");
        self.handles.insert(name, Box::new(handle));
        Ok(())
    }

    /// 대상을 해제합니다. 폴링 중이면 중지합니다.
    pub fn deregister(&mut self, name: &str) -> RefreshResult<()> {
        let handle = self
            .handles
            .remove(name)
            .ok_or_else(|| RefreshError::NotRegistered(name.to_string()))?;
        handle.stop();
        tracing::debug!(target_name = %name, "폴링 대상 해제");
        Ok(())
    }

    fn get(&self, name: &str) -> RefreshResult<&dyn RefreshHandle> {
        self.handles
            .get(name)
            .map(|handle| handle.as_ref())
            .ok_or_else(|| RefreshError::NotRegistered(name.to_string()))
    }

    /// 대상 하나의 폴링을 시작합니다.
    pub fn start(&self, name: &str) -> RefreshResult<()> {
        self.get(name)?.start()
    }

    /// 대상 하나의 폴링을 중지합니다.
    pub fn stop(&self, name: &str) -> RefreshResult<()> {
        self.get(name)?.stop();
        Ok(())
    }

    /// 대상 하나를 수동 갱신합니다.
    pub fn trigger(&self, name: &str) -> RefreshResult<TriggerOutcome> {
        Ok(self.get(name)?.trigger())
    }

    /// 대상 하나의 현재 상태.
    pub fn state(&self, name: &str) -> RefreshResult<RefreshState> {
        Ok(self.get(name)?.state())
    }

    /// 중지된 모든 대상을 시작합니다. 첫 실패에서 멈춥니다.
    pub fn start_all(&self) -> RefreshResult<()> {
        for handle in self.handles.values() {
            if !handle.is_running() {
                handle.start()?;
            }
        }
        Ok(())
    }

    /// 모든 대상을 중지합니다.
    pub fn stop_all(&self) {
        for handle in self.handles.values() {
            handle.stop();
        }
    }

    /// 등록된 대상 이름 (정렬됨).
    pub fn names(&self) -> Vec<String> {
        self.handles.keys().cloned().collect()
    }

    /// 대상별 현재 상태.
    pub fn states(&self) -> Vec<(String, RefreshState)> {
        self.handles
            .iter()
            .map(|(name, handle)| (name.clone(), handle.state()))
            .collect()
    }

    /// 대상별 통계.
    pub fn stats(&self) -> Vec<(String, RefreshStats)> {
        self.handles
            .iter()
            .map(|(name, handle)| (name.clone(), handle.stats()))
            .collect()
    }

    /// 등록된 대상 수.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Drop for RefreshRegistry {
    fn drop(&mut self) {
        self.stop_all();
    }
}
