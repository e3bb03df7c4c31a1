//! 目标源统计：Rust trait 形式与引入形式两种暴露方式。
//!
//! 引入形式让调用方只持有代理也能查询统计，方法名与 trait 方法名一一对应，返回值以
//! [`Value`] 承载（计数为 `u64`，容量与数量为 `usize`）。

use std::sync::Arc;

use crate::descriptor::MethodDescriptor;
use crate::error::InvocationError;
use crate::introduction::IntroductionDelegate;
use crate::value::Value;

/// 池统计接口名。
pub const POOLING_STATS_INTERFACE: &str = "spark.aop.PoolingStats";
/// 线程绑定统计接口名。
pub const THREAD_LOCAL_STATS_INTERFACE: &str = "spark.aop.ThreadLocalStats";

pub trait PoolingStats {
    fn max_size(&self) -> usize;

    fn active_count(&self) -> usize;

    fn idle_count(&self) -> usize;

    /// 累计成功借出次数。
    fn borrow_count(&self) -> u64;
}

pub trait ThreadLocalStats {
    /// 累计取目标次数。
    fn invocation_count(&self) -> u64;

    /// 命中当前线程已绑定实例的次数。
    fn hit_count(&self) -> u64;

    /// 当前存活（尚未销毁）的实例数。
    fn object_count(&self) -> usize;
}

/// 池统计接口上名为 `name` 的无参方法描述。
pub fn pooling_stats_method(name: &str) -> MethodDescriptor {
    MethodDescriptor::new(POOLING_STATS_INTERFACE, name, Vec::<&str>::new())
}

/// 线程绑定统计接口上名为 `name` 的无参方法描述。
pub fn thread_local_stats_method(name: &str) -> MethodDescriptor {
    MethodDescriptor::new(THREAD_LOCAL_STATS_INTERFACE, name, Vec::<&str>::new())
}

pub(crate) struct PoolingStatsDelegate<S>(pub(crate) S);

impl<S> IntroductionDelegate for PoolingStatsDelegate<S>
where
    S: PoolingStats + Send + Sync + 'static,
{
    fn implemented_interfaces(&self) -> Vec<Arc<str>> {
        vec![Arc::from(POOLING_STATS_INTERFACE)]
    }

    fn invoke(&self, method: &MethodDescriptor, _args: &[Value]) -> Result<Value, InvocationError> {
        match method.name() {
            "max_size" => Ok(Value::new(self.0.max_size())),
            "active_count" => Ok(Value::new(self.0.active_count())),
            "idle_count" => Ok(Value::new(self.0.idle_count())),
            "borrow_count" => Ok(Value::new(self.0.borrow_count())),
            _ => Err(InvocationError::UnsupportedMethod {
                method: method.signature(),
            }),
        }
    }
}

pub(crate) struct ThreadLocalStatsDelegate<S>(pub(crate) S);

impl<S> IntroductionDelegate for ThreadLocalStatsDelegate<S>
where
    S: ThreadLocalStats + Send + Sync + 'static,
{
    fn implemented_interfaces(&self) -> Vec<Arc<str>> {
        vec![Arc::from(THREAD_LOCAL_STATS_INTERFACE)]
    }

    fn invoke(&self, method: &MethodDescriptor, _args: &[Value]) -> Result<Value, InvocationError> {
        match method.name() {
            "invocation_count" => Ok(Value::new(self.0.invocation_count())),
            "hit_count" => Ok(Value::new(self.0.hit_count())),
            "object_count" => Ok(Value::new(self.0.object_count())),
            _ => Err(InvocationError::UnsupportedMethod {
                method: method.signature(),
            }),
        }
    }
}
