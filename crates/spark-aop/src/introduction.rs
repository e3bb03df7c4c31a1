//! 引入（Introduction）：让代理暴露目标对象并未实现的接口。
//!
//! # 设计背景（Why）
//! - 典型场景是为业务对象追加管理接口（如池统计、锁状态），而无需修改目标类型；
//! - 被引入接口上的调用由委托对象承接，永远不会落到目标对象上。
//!
//! # 契约说明（What）
//! - 引入通知器承诺的接口必须是委托 `implemented_interfaces()` 的子集，否则注册或构建代理时
//!   返回 [`ConfigError::UnimplementedInterface`]；
//! - 调用落在被引入接口上的判定依据 [`MethodDescriptor::declaring_type`]；
//! - 只要类型过滤器匹配目标类型，引入就会进入该类型所有方法的链，无需方法级匹配。

use std::fmt;
use std::sync::Arc;

use crate::descriptor::MethodDescriptor;
use crate::error::{ConfigError, InvocationError};
use crate::matcher::ClassFilter;
use crate::value::Value;

/// 承接被引入接口调用的委托对象。
pub trait IntroductionDelegate: Send + Sync + 'static {
    /// 委托实际实现的接口名。
    fn implemented_interfaces(&self) -> Vec<Arc<str>>;

    fn invoke(&self, method: &MethodDescriptor, args: &[Value]) -> Result<Value, InvocationError>;
}

struct FnDelegate<F> {
    interfaces: Vec<Arc<str>>,
    handler: F,
}

impl<F> IntroductionDelegate for FnDelegate<F>
where
    F: Fn(&MethodDescriptor, &[Value]) -> Result<Value, InvocationError> + Send + Sync + 'static,
{
    fn implemented_interfaces(&self) -> Vec<Arc<str>> {
        self.interfaces.clone()
    }

    fn invoke(&self, method: &MethodDescriptor, args: &[Value]) -> Result<Value, InvocationError> {
        (self.handler)(method, args)
    }
}

/// 引入通知器主体。
///
/// # 教案式说明
/// - **意图（Why）**：把“暴露哪些接口”“对哪些类型生效”“由谁实现”三者绑定成一个不可变值；
/// - **契约（What）**：默认承诺委托实现的全部接口、对所有类型生效；
///   [`IntroductionAdvisor::with_interfaces`] 可收窄（或错误地放大）承诺范围，后者在校验时被拒绝。
#[derive(Clone)]
pub struct IntroductionAdvisor {
    class_filter: ClassFilter,
    interfaces: Arc<[Arc<str>]>,
    delegate: Arc<dyn IntroductionDelegate>,
}

impl IntroductionAdvisor {
    pub fn new(delegate: Arc<dyn IntroductionDelegate>) -> Self {
        Self {
            class_filter: ClassFilter::True,
            interfaces: delegate.implemented_interfaces().into(),
            delegate,
        }
    }

    /// 以闭包实现委托；`interfaces` 同时作为委托实现的接口与承诺的接口。
    pub fn from_fn<I, S, F>(interfaces: I, handler: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
        F: Fn(&MethodDescriptor, &[Value]) -> Result<Value, InvocationError>
            + Send
            + Sync
            + 'static,
    {
        let interfaces = interfaces.into_iter().map(Into::into).collect();
        Self::new(Arc::new(FnDelegate {
            interfaces,
            handler,
        }))
    }

    pub fn with_interfaces<I, S>(mut self, interfaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        self.interfaces = interfaces.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_class_filter(mut self, class_filter: ClassFilter) -> Self {
        self.class_filter = class_filter;
        self
    }

    pub fn class_filter(&self) -> &ClassFilter {
        &self.class_filter
    }

    pub fn interfaces(&self) -> &[Arc<str>] {
        &self.interfaces
    }

    pub fn delegate(&self) -> &Arc<dyn IntroductionDelegate> {
        &self.delegate
    }

    /// 校验承诺的接口均由委托实现。
    pub fn validate_interfaces(&self, advisor: &str) -> Result<(), ConfigError> {
        let implemented = self.delegate.implemented_interfaces();
        match self
            .interfaces
            .iter()
            .find(|promised| !implemented.contains(promised))
        {
            Some(missing) => Err(ConfigError::UnimplementedInterface {
                advisor: advisor.to_owned(),
                interface: missing.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// 方法是否声明在被引入的接口上。
    pub fn introduces(&self, method: &MethodDescriptor) -> bool {
        self.interfaces
            .iter()
            .any(|interface| &**interface == method.declaring_type())
    }

    pub(crate) fn same_as(&self, other: &IntroductionAdvisor) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.delegate), Arc::as_ptr(&other.delegate))
            && self.interfaces == other.interfaces
            && self.class_filter == other.class_filter
    }
}

impl fmt::Debug for IntroductionAdvisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntroductionAdvisor")
            .field("class_filter", &self.class_filter)
            .field("interfaces", &self.interfaces)
            .finish_non_exhaustive()
    }
}
