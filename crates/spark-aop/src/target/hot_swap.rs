use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::descriptor::TypeDescriptor;
use crate::error::InvocationError;
use crate::observability::targets;

use super::{TargetRef, TargetSource, identity};

/// 可在运行中替换目标的目标源。
///
/// # 教案式说明
/// - **意图（Why）**：不重建代理即可切换实现，例如灰度替换或故障转移；
/// - **逻辑（How）**：当前实例保存在 `ArcSwap` 中，读取无锁且不会读到撕裂状态；替换在互斥锁下
///   串行执行；
/// - **契约（What）**：`swap` 返回旧实例；正在执行的调用继续使用其取得的旧实例直到结束，
///   之后开始的调用看到新实例。
pub struct HotSwappableTargetSource {
    current: ArcSwap<TargetRef>,
    target_type: TypeDescriptor,
    swap_lock: Mutex<()>,
}

impl HotSwappableTargetSource {
    pub fn new(initial: TargetRef, target_type: TypeDescriptor) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
            target_type,
            swap_lock: Mutex::new(()),
        }
    }

    /// 替换当前目标，返回旧目标。
    pub fn swap(&self, replacement: TargetRef) -> TargetRef {
        let _serialized = self.swap_lock.lock();
        let next = identity(&replacement);
        let previous = self.current.swap(Arc::new(replacement));
        tracing::info!(
            target: targets::TARGET,
            strategy = "hot_swap",
            target_type = self.target_type.name(),
            unchanged = identity(&previous) == next,
            "swapped target"
        );
        Arc::unwrap_or_clone(previous)
    }

    pub fn current(&self) -> TargetRef {
        TargetRef::clone(&self.current.load())
    }
}

impl TargetSource for HotSwappableTargetSource {
    fn target_type(&self) -> Option<TypeDescriptor> {
        Some(self.target_type.clone())
    }

    fn is_static(&self) -> bool {
        false
    }

    fn get_target(&self) -> Result<Option<TargetRef>, InvocationError> {
        Ok(Some(self.current()))
    }

    fn release_target(&self, _target: TargetRef) {}
}

impl fmt::Debug for HotSwappableTargetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HotSwappableTargetSource")
            .field("target_type", &self.target_type.name())
            .finish_non_exhaustive()
    }
}
