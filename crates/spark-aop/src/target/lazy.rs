use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::descriptor::TypeDescriptor;
use crate::error::InvocationError;

use super::{TargetFactory, TargetRef, TargetSource, create_target};

/// 首次调用时才创建目标的目标源。
///
/// # 教案式说明
/// - **契约（What）**：实例恰好创建一次；创建失败不缓存，下一次调用重试；创建成功之后
///   `is_static()` 变为 `true`；
/// - **逻辑（How）**：`OnceLock` 提供无锁读取，初始化过程由互斥锁串行，避免并发首调重复创建。
pub struct LazyInitTargetSource {
    factory: Arc<dyn TargetFactory>,
    target: OnceLock<TargetRef>,
    init: Mutex<()>,
}

impl LazyInitTargetSource {
    pub fn new(factory: Arc<dyn TargetFactory>) -> Self {
        Self {
            factory,
            target: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.target.get().is_some()
    }
}

impl TargetSource for LazyInitTargetSource {
    fn target_type(&self) -> Option<TypeDescriptor> {
        Some(self.factory.target_type())
    }

    fn is_static(&self) -> bool {
        self.is_initialized()
    }

    fn get_target(&self) -> Result<Option<TargetRef>, InvocationError> {
        if let Some(target) = self.target.get() {
            return Ok(Some(TargetRef::clone(target)));
        }
        let _init = self.init.lock();
        if let Some(target) = self.target.get() {
            return Ok(Some(TargetRef::clone(target)));
        }
        let target = create_target(self.factory.as_ref())?;
        Ok(Some(TargetRef::clone(self.target.get_or_init(|| target))))
    }

    fn release_target(&self, _target: TargetRef) {}
}

impl fmt::Debug for LazyInitTargetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyInitTargetSource")
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}
