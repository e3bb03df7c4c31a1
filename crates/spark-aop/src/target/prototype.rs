use std::sync::Arc;

use crate::descriptor::TypeDescriptor;
use crate::error::{ConfigError, InvocationError};

use super::{TargetFactory, TargetRef, TargetSource, create_target, destroy_target, require_prototype};

/// 每次调用创建新实例、调用结束即销毁的目标源。
pub struct PrototypeTargetSource {
    factory: Arc<dyn TargetFactory>,
}

impl PrototypeTargetSource {
    /// 工厂不是原型时返回 [`ConfigError::NotPrototype`]。
    pub fn new(factory: Arc<dyn TargetFactory>) -> Result<Self, ConfigError> {
        require_prototype(factory.as_ref(), "prototype")?;
        Ok(Self { factory })
    }
}

impl TargetSource for PrototypeTargetSource {
    fn target_type(&self) -> Option<TypeDescriptor> {
        Some(self.factory.target_type())
    }

    fn is_static(&self) -> bool {
        false
    }

    fn get_target(&self) -> Result<Option<TargetRef>, InvocationError> {
        create_target(self.factory.as_ref()).map(Some)
    }

    fn release_target(&self, target: TargetRef) {
        destroy_target(self.factory.as_ref(), target, "prototype");
    }
}
