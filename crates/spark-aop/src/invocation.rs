//! 调用引擎：以显式游标推进拦截链，链尾调用真实目标。
//!
//! # 设计背景（Why）
//! - 每次代理调用对应一个 [`MethodInvocation`]，记录目标、方法、参数、链与游标；
//! - 环绕通知通过 [`MethodInvocation::proceed`] 决定是否、何时、几次继续；前置与后置类通知无需
//!   自行推进，由引擎在同一帧内顺序处理，因此递归深度只与环绕通知的数量相关。
//!
//! # 契约说明（What）
//! - 游标只前进不后退：同一拦截器第二次调用 `proceed()` 会从上次停下的位置（即目标）继续；
//!   需要重放剩余链时使用 [`MethodInvocation::invocable_clone`]；
//! - 错误原样向外传播；后置异常通知只能观察或替换错误，不能把失败改写为成功；
//! - 原调用结束且目标已归还后，推进其克隆会得到 [`InvocationError::Protocol`]。

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::chain::{Chain, Interceptor};
use crate::descriptor::{MethodDescriptor, TypeDescriptor};
use crate::error::InvocationError;
use crate::proxy::Proxy;
use crate::target::TargetRef;
use crate::value::{Arguments, Attributes, Value};

/// 调用状态。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvocationState {
    Created,
    Proceeding,
    InvokingTarget,
    Completed,
    Failed,
}

/// 单次调用的可变记录。
///
/// # 教案式说明
/// - **意图（Why）**：把一次调用所需的全部上下文集中在一个值里，拦截器之间只通过它协作；
/// - **逻辑（How）**：`proceed` 在一个循环中从游标处逐项处理：
///   1. 运行期匹配器拒绝的项被跳过，此时更早拦截器对参数的修改已经可见；
///   2. 前置通知内联执行；后置类通知登记到本帧，待本帧结果确定后由内向外执行；
///   3. 环绕通知与命中的引入结束本帧循环；
///   4. 链尾调用目标，参数取当前参数句柄的快照；
/// - **契约（What）**：
///   - 参数句柄共享：`arguments().set(i, v)` 对所有持有者可见，`set_arguments` 安装新句柄，仅影响之后；
///   - 克隆复制属性表，克隆的写入不影响原调用；
///   - 目标为空时在链尾返回 [`InvocationError::NoTarget`]。
pub struct MethodInvocation {
    proxy: Proxy,
    target: Option<TargetRef>,
    target_type: TypeDescriptor,
    method: MethodDescriptor,
    arguments: Arguments,
    chain: Chain,
    cursor: usize,
    depth: usize,
    attributes: Attributes,
    state: InvocationState,
    released: Arc<AtomicBool>,
}

impl MethodInvocation {
    pub(crate) fn new(
        proxy: Proxy,
        target: Option<TargetRef>,
        target_type: TypeDescriptor,
        method: MethodDescriptor,
        arguments: Vec<Value>,
        chain: Chain,
        released: Arc<AtomicBool>,
    ) -> Self {
        Self {
            proxy,
            target,
            target_type,
            method,
            arguments: Arguments::new(arguments),
            chain,
            cursor: 0,
            depth: 0,
            attributes: Attributes::default(),
            state: InvocationState::Created,
            released,
        }
    }

    /// 执行剩余拦截链与目标方法。
    pub fn proceed(&mut self) -> Result<Value, InvocationError> {
        self.depth += 1;
        self.state = InvocationState::Proceeding;

        let mut pending = Vec::new();
        let outcome = self.walk(&mut pending);
        let outcome = self.settle(pending, outcome);

        self.depth -= 1;
        if self.depth == 0 {
            self.state = if outcome.is_ok() {
                InvocationState::Completed
            } else {
                InvocationState::Failed
            };
        }
        outcome
    }

    fn walk(&mut self, pending: &mut Vec<Interceptor>) -> Result<Value, InvocationError> {
        let chain = self.chain.clone();
        while let Some(entry) = chain.entries().get(self.cursor) {
            self.cursor += 1;
            if let Some(matcher) = entry.runtime_matcher()
                && !matcher.matches_args(&self.method, &self.target_type, &self.arguments)
            {
                continue;
            }
            match entry.interceptor() {
                Interceptor::Before(advice) => advice.before(self)?,
                Interceptor::Around(interceptor) => return interceptor.invoke(self),
                Interceptor::Introduction(intro) => {
                    if intro.introduces(&self.method) {
                        let args = self.arguments.snapshot();
                        return intro.delegate().invoke(&self.method, &args);
                    }
                }
                after @ (Interceptor::AfterReturning(_)
                | Interceptor::AfterThrowing(_)
                | Interceptor::After(_)) => pending.push(after.clone()),
            }
        }
        self.invoke_joinpoint()
    }

    /// 本帧结果确定后，由内向外执行登记的后置类通知。
    fn settle(
        &self,
        pending: Vec<Interceptor>,
        mut outcome: Result<Value, InvocationError>,
    ) -> Result<Value, InvocationError> {
        for interceptor in pending.into_iter().rev() {
            let replacement = match (&interceptor, &outcome) {
                (Interceptor::AfterReturning(advice), Ok(value)) => {
                    advice.after_returning(value, self).err()
                }
                (Interceptor::AfterThrowing(advice), Err(error)) => {
                    advice.after_throwing(error, self).err()
                }
                (Interceptor::After(advice), result) => advice.after(result.as_ref(), self).err(),
                _ => None,
            };
            if let Some(error) = replacement {
                outcome = Err(error);
            }
        }
        outcome
    }

    fn invoke_joinpoint(&mut self) -> Result<Value, InvocationError> {
        if self.released.load(Ordering::Acquire) {
            return Err(InvocationError::Protocol {
                detail: format!(
                    "invocation of `{}` proceeded after its target was released",
                    self.method
                ),
            });
        }
        let Some(target) = self.target.clone() else {
            return Err(InvocationError::NoTarget {
                method: self.method.signature(),
            });
        };
        self.state = InvocationState::InvokingTarget;
        let args = self.arguments.snapshot();
        let result = target.invoke(&self.method, &args);
        self.state = InvocationState::Proceeding;
        result
    }

    /// 在当前游标处复制调用，参数与属性表都复制到新的存储中。
    pub fn invocable_clone(&self) -> MethodInvocation {
        self.clone_with_arguments(self.arguments.detached())
    }

    /// 在当前游标处复制调用，并使用给定参数。
    pub fn invocable_clone_with(&self, arguments: Vec<Value>) -> MethodInvocation {
        self.clone_with_arguments(Arguments::new(arguments))
    }

    fn clone_with_arguments(&self, arguments: Arguments) -> MethodInvocation {
        MethodInvocation {
            proxy: self.proxy.clone(),
            target: self.target.clone(),
            target_type: self.target_type.clone(),
            method: self.method.clone(),
            arguments,
            chain: self.chain.clone(),
            cursor: self.cursor,
            depth: 0,
            attributes: self.attributes.detached(),
            state: InvocationState::Created,
            released: Arc::clone(&self.released),
        }
    }

    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    pub fn target(&self) -> Option<&TargetRef> {
        self.target.as_ref()
    }

    pub fn target_type(&self) -> &TypeDescriptor {
        &self.target_type
    }

    pub fn method(&self) -> &MethodDescriptor {
        &self.method
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// 整体替换参数：安装新的参数句柄，之前取得的句柄不受影响。
    pub fn set_arguments(&mut self, arguments: Vec<Value>) {
        self.arguments = Arguments::new(arguments);
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn state(&self) -> InvocationState {
        self.state
    }

    /// 下一个待处理链项的位置。
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }
}

impl fmt::Debug for MethodInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodInvocation")
            .field("method", &self.method.signature())
            .field("target_type", &self.target_type.name())
            .field("position", &self.cursor)
            .field("chain_len", &self.chain.len())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
