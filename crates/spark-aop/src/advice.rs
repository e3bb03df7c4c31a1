//! 通知模型：以带标签的联合体表达各类通知。
//!
//! # 设计背景（Why）
//! - 各类通知在链中的执行方式不同：环绕通知自行决定是否推进，前置通知内联执行，后置类通知
//!   等待当前帧结果后再运行；以枚举承载可以让链构建与调用引擎穷举处理；
//! - 自定义通知（[`Advice::Custom`]）以不透明负载携带，必须经由已注册的适配器转换为拦截器，
//!   否则在代理构建时即报错。
//!
//! # 契约说明（What）
//! - 所有通知对象须为 `Send + Sync`，可在线程间共享；
//! - 闭包形式的构造函数（`around_fn`、`before_fn` 等）仅为便利包装，语义与手写实现完全一致。

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::InvocationError;
use crate::invocation::MethodInvocation;
use crate::value::Value;

/// 环绕通知：拿到调用对象后自行决定是否、何时、几次调用 [`MethodInvocation::proceed`]。
pub trait MethodInterceptor: Send + Sync + 'static {
    fn invoke(&self, invocation: &mut MethodInvocation) -> Result<Value, InvocationError>;
}

/// 前置通知：返回错误即终止调用，目标不会被执行。
pub trait BeforeAdvice: Send + Sync + 'static {
    fn before(&self, invocation: &MethodInvocation) -> Result<(), InvocationError>;
}

/// 正常返回后的通知。
pub trait AfterReturningAdvice: Send + Sync + 'static {
    fn after_returning(
        &self,
        returned: &Value,
        invocation: &MethodInvocation,
    ) -> Result<(), InvocationError>;
}

/// 异常返回后的通知。
///
/// # 教案式说明
/// - **契约（What）**：返回 `Ok(())` 表示观察完毕，原错误继续向外传播；返回 `Err` 表示以新错误
///   替换原错误。该通知无法把失败改写为成功。
pub trait ThrowsAdvice: Send + Sync + 'static {
    fn after_throwing(
        &self,
        error: &InvocationError,
        invocation: &MethodInvocation,
    ) -> Result<(), InvocationError>;
}

/// 最终通知：无论成功失败都会运行。
///
/// 返回 `Err` 时以该错误作为调用结果（覆盖原返回值或原错误）。
pub trait AfterAdvice: Send + Sync + 'static {
    fn after(
        &self,
        outcome: Result<&Value, &InvocationError>,
        invocation: &MethodInvocation,
    ) -> Result<(), InvocationError>;
}

/// 需要适配器才能进入拦截链的自定义通知。
#[derive(Clone)]
pub struct CustomAdvice {
    kind: Arc<str>,
    payload: Arc<dyn Any + Send + Sync>,
    after: bool,
}

impl CustomAdvice {
    pub fn new<T>(kind: impl Into<Arc<str>>, payload: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            kind: kind.into(),
            payload: Arc::new(payload),
            after: false,
        }
    }

    /// 标记为后置类通知，影响同一切面内的排序规则。
    pub fn as_after(mut self) -> Self {
        self.after = true;
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn is_after(&self) -> bool {
        self.after
    }

    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

impl fmt::Debug for CustomAdvice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomAdvice")
            .field("kind", &self.kind)
            .field("after", &self.after)
            .finish_non_exhaustive()
    }
}

/// 通知种类标签。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AdviceKind {
    Around,
    Before,
    AfterReturning,
    AfterThrowing,
    After,
    Custom,
}

/// 通知的带标签联合体。
#[derive(Clone)]
pub enum Advice {
    Around(Arc<dyn MethodInterceptor>),
    Before(Arc<dyn BeforeAdvice>),
    AfterReturning(Arc<dyn AfterReturningAdvice>),
    AfterThrowing(Arc<dyn ThrowsAdvice>),
    After(Arc<dyn AfterAdvice>),
    Custom(CustomAdvice),
}

impl Advice {
    pub fn kind(&self) -> AdviceKind {
        match self {
            Advice::Around(_) => AdviceKind::Around,
            Advice::Before(_) => AdviceKind::Before,
            Advice::AfterReturning(_) => AdviceKind::AfterReturning,
            Advice::AfterThrowing(_) => AdviceKind::AfterThrowing,
            Advice::After(_) => AdviceKind::After,
            Advice::Custom(_) => AdviceKind::Custom,
        }
    }

    /// 是否属于后置类通知（after / after-returning / after-throwing，或标记为后置的自定义通知）。
    pub fn is_after(&self) -> bool {
        match self {
            Advice::After(_) | Advice::AfterReturning(_) | Advice::AfterThrowing(_) => true,
            Advice::Custom(custom) => custom.is_after(),
            Advice::Around(_) | Advice::Before(_) => false,
        }
    }

    pub fn around_fn<F>(f: F) -> Self
    where
        F: Fn(&mut MethodInvocation) -> Result<Value, InvocationError> + Send + Sync + 'static,
    {
        Advice::Around(Arc::new(FnAround(f)))
    }

    pub fn before_fn<F>(f: F) -> Self
    where
        F: Fn(&MethodInvocation) -> Result<(), InvocationError> + Send + Sync + 'static,
    {
        Advice::Before(Arc::new(FnBefore(f)))
    }

    pub fn after_returning_fn<F>(f: F) -> Self
    where
        F: Fn(&Value, &MethodInvocation) -> Result<(), InvocationError> + Send + Sync + 'static,
    {
        Advice::AfterReturning(Arc::new(FnAfterReturning(f)))
    }

    pub fn after_throwing_fn<F>(f: F) -> Self
    where
        F: Fn(&InvocationError, &MethodInvocation) -> Result<(), InvocationError>
            + Send
            + Sync
            + 'static,
    {
        Advice::AfterThrowing(Arc::new(FnThrows(f)))
    }

    pub fn after_fn<F>(f: F) -> Self
    where
        F: Fn(Result<&Value, &InvocationError>, &MethodInvocation) -> Result<(), InvocationError>
            + Send
            + Sync
            + 'static,
    {
        Advice::After(Arc::new(FnAfter(f)))
    }
}

impl fmt::Debug for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advice::Custom(custom) => custom.fmt(f),
            other => write!(f, "Advice::{:?}", other.kind()),
        }
    }
}

struct FnAround<F>(F);

impl<F> MethodInterceptor for FnAround<F>
where
    F: Fn(&mut MethodInvocation) -> Result<Value, InvocationError> + Send + Sync + 'static,
{
    fn invoke(&self, invocation: &mut MethodInvocation) -> Result<Value, InvocationError> {
        (self.0)(invocation)
    }
}

struct FnBefore<F>(F);

impl<F> BeforeAdvice for FnBefore<F>
where
    F: Fn(&MethodInvocation) -> Result<(), InvocationError> + Send + Sync + 'static,
{
    fn before(&self, invocation: &MethodInvocation) -> Result<(), InvocationError> {
        (self.0)(invocation)
    }
}

struct FnAfterReturning<F>(F);

impl<F> AfterReturningAdvice for FnAfterReturning<F>
where
    F: Fn(&Value, &MethodInvocation) -> Result<(), InvocationError> + Send + Sync + 'static,
{
    fn after_returning(
        &self,
        returned: &Value,
        invocation: &MethodInvocation,
    ) -> Result<(), InvocationError> {
        (self.0)(returned, invocation)
    }
}

struct FnThrows<F>(F);

impl<F> ThrowsAdvice for FnThrows<F>
where
    F: Fn(&InvocationError, &MethodInvocation) -> Result<(), InvocationError>
        + Send
        + Sync
        + 'static,
{
    fn after_throwing(
        &self,
        error: &InvocationError,
        invocation: &MethodInvocation,
    ) -> Result<(), InvocationError> {
        (self.0)(error, invocation)
    }
}

struct FnAfter<F>(F);

impl<F> AfterAdvice for FnAfter<F>
where
    F: Fn(Result<&Value, &InvocationError>, &MethodInvocation) -> Result<(), InvocationError>
        + Send
        + Sync
        + 'static,
{
    fn after(
        &self,
        outcome: Result<&Value, &InvocationError>,
        invocation: &MethodInvocation,
    ) -> Result<(), InvocationError> {
        (self.0)(outcome, invocation)
    }
}
