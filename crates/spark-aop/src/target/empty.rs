use crate::descriptor::TypeDescriptor;
use crate::error::InvocationError;

use super::{TargetRef, TargetSource};

/// 没有目标的静态目标源。
///
/// 适用于所有调用都由拦截器或引入承接的代理；若链走到尽头，调用以
/// [`InvocationError::NoTarget`] 失败。
#[derive(Clone, Debug, Default)]
pub struct EmptyTargetSource {
    target_type: Option<TypeDescriptor>,
}

impl EmptyTargetSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// 声明代理所代表的类型，供类型过滤器使用。
    pub fn for_type(target_type: TypeDescriptor) -> Self {
        Self {
            target_type: Some(target_type),
        }
    }
}

impl TargetSource for EmptyTargetSource {
    fn target_type(&self) -> Option<TypeDescriptor> {
        self.target_type.clone()
    }

    fn is_static(&self) -> bool {
        true
    }

    fn get_target(&self) -> Result<Option<TargetRef>, InvocationError> {
        Ok(None)
    }

    fn release_target(&self, _target: TargetRef) {}
}
