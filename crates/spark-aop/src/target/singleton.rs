use crate::descriptor::TypeDescriptor;
use crate::error::InvocationError;

use super::{TargetRef, TargetSource};

/// 始终返回同一实例的静态目标源。
#[derive(Clone)]
pub struct SingletonTargetSource {
    target: TargetRef,
    target_type: TypeDescriptor,
}

impl SingletonTargetSource {
    pub fn new(target: TargetRef, target_type: TypeDescriptor) -> Self {
        Self {
            target,
            target_type,
        }
    }

    pub fn target(&self) -> &TargetRef {
        &self.target
    }
}

impl TargetSource for SingletonTargetSource {
    fn target_type(&self) -> Option<TypeDescriptor> {
        Some(self.target_type.clone())
    }

    fn is_static(&self) -> bool {
        true
    }

    fn get_target(&self) -> Result<Option<TargetRef>, InvocationError> {
        Ok(Some(TargetRef::clone(&self.target)))
    }

    fn release_target(&self, _target: TargetRef) {}
}
