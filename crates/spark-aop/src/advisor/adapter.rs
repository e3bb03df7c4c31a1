//! 通知适配：把 [`Advice`] 转换为链中可执行的 [`Interceptor`]。
//!
//! 内置通知种类由注册表直接转换；[`Advice::Custom`] 依次询问已注册的 [`AdvisorAdapter`]，
//! 无一支持时返回 [`ConfigError::UnknownAdvice`]。

use std::fmt;
use std::sync::Arc;

use crate::advice::{Advice, CustomAdvice};
use crate::chain::Interceptor;
use crate::error::ConfigError;

/// 自定义通知适配器。
pub trait AdvisorAdapter: Send + Sync + 'static {
    fn supports(&self, advice: &CustomAdvice) -> bool;

    fn interceptor(&self, advice: &CustomAdvice) -> Result<Interceptor, ConfigError>;
}

/// 适配器注册表，按注册顺序询问。
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn AdvisorAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn AdvisorAdapter>) {
        self.adapters.push(adapter);
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// 将 `advisor` 名下的通知转换为拦截器。
    pub fn adapt(&self, advisor: &str, advice: &Advice) -> Result<Interceptor, ConfigError> {
        match advice {
            Advice::Around(i) => Ok(Interceptor::Around(Arc::clone(i))),
            Advice::Before(b) => Ok(Interceptor::Before(Arc::clone(b))),
            Advice::AfterReturning(a) => Ok(Interceptor::AfterReturning(Arc::clone(a))),
            Advice::AfterThrowing(t) => Ok(Interceptor::AfterThrowing(Arc::clone(t))),
            Advice::After(a) => Ok(Interceptor::After(Arc::clone(a))),
            Advice::Custom(custom) => self
                .adapters
                .iter()
                .find(|adapter| adapter.supports(custom))
                .ok_or_else(|| ConfigError::UnknownAdvice {
                    advisor: advisor.to_owned(),
                    kind: custom.kind().to_owned(),
                })?
                .interceptor(custom),
        }
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("adapters", &self.adapters.len())
            .finish()
    }
}
