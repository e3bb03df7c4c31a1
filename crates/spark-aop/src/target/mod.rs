//! 目标源：决定每次调用使用哪个目标实例，以及调用结束后如何回收。
//!
//! # 设计背景（Why）
//! - 代理与目标之间隔着一层策略：单例、每次新建、池化、线程绑定、懒加载、热替换；
//!   拦截链对策略无感知，只在调用前取得目标、调用后（包括错误回溯时）归还；
//! - 依赖注入容器不在本 crate 范围内，实例的创建与销毁抽象为 [`TargetFactory`]。
//!
//! # 契约说明（What）
//! - `is_static()` 为真时 `get_target()` 总是返回同一实例，且无需归还；
//! - `release_target` 不返回错误：不属于本源的实例被忽略，销毁失败仅记录日志；
//! - 需要“每次请求新实例”的策略（原型、池化、线程绑定）在构造时拒绝非原型工厂。

mod empty;
mod hot_swap;
mod lazy;
mod pool;
mod prototype;
mod singleton;
mod stats;
mod thread_local;

use std::fmt;
use std::sync::Arc;

use crate::descriptor::{MethodDescriptor, TypeDescriptor};
use crate::error::{BoxError, ConfigError, InvocationError};
use crate::value::Value;

pub use empty::EmptyTargetSource;
pub use hot_swap::HotSwappableTargetSource;
pub use lazy::LazyInitTargetSource;
pub use pool::PooledTargetSource;
pub use prototype::PrototypeTargetSource;
pub use singleton::SingletonTargetSource;
pub use stats::{
    POOLING_STATS_INTERFACE, PoolingStats, THREAD_LOCAL_STATS_INTERFACE, ThreadLocalStats,
    pooling_stats_method, thread_local_stats_method,
};
pub use thread_local::ThreadLocalTargetSource;

/// 被代理的真实对象。
///
/// 方法分派由实现方根据 [`MethodDescriptor`] 完成；不认识的方法应返回
/// [`InvocationError::UnsupportedMethod`]。
pub trait Target: Send + Sync + 'static {
    fn invoke(&self, method: &MethodDescriptor, args: &[Value]) -> Result<Value, InvocationError>;
}

/// 目标实例的共享句柄。
pub type TargetRef = Arc<dyn Target>;

/// 目标源策略。
pub trait TargetSource: Send + Sync + 'static {
    /// 目标类型；空目标源可能无法给出。
    fn target_type(&self) -> Option<TypeDescriptor>;

    fn is_static(&self) -> bool;

    fn get_target(&self) -> Result<Option<TargetRef>, InvocationError>;

    fn release_target(&self, target: TargetRef);
}

/// 目标实例工厂，替代外部容器。
///
/// # 教案式说明
/// - **契约（What）**：
///   - `is_prototype()` 为真表示每次 `create()` 都返回新实例；
///   - `destroy()` 默认直接丢弃实例，需要释放外部资源的实现应覆盖它；
///   - 错误以 [`BoxError`] 返回，目标源负责包装为 [`InvocationError::TargetCreation`] 或记录日志。
pub trait TargetFactory: Send + Sync + 'static {
    fn target_type(&self) -> TypeDescriptor;

    fn is_prototype(&self) -> bool {
        true
    }

    fn create(&self) -> Result<TargetRef, BoxError>;

    fn destroy(&self, target: TargetRef) -> Result<(), BoxError> {
        drop(target);
        Ok(())
    }
}

/// 以闭包实现的工厂。
pub struct FnTargetFactory<F> {
    target_type: TypeDescriptor,
    prototype: bool,
    create: F,
}

impl<F> FnTargetFactory<F>
where
    F: Fn() -> Result<TargetRef, BoxError> + Send + Sync + 'static,
{
    /// 原型工厂：每次调用闭包都应返回新实例。
    pub fn new(target_type: TypeDescriptor, create: F) -> Self {
        Self {
            target_type,
            prototype: true,
            create,
        }
    }

    /// 标记为共享（非原型）工厂。
    pub fn shared(mut self) -> Self {
        self.prototype = false;
        self
    }
}

impl<F> TargetFactory for FnTargetFactory<F>
where
    F: Fn() -> Result<TargetRef, BoxError> + Send + Sync + 'static,
{
    fn target_type(&self) -> TypeDescriptor {
        self.target_type.clone()
    }

    fn is_prototype(&self) -> bool {
        self.prototype
    }

    fn create(&self) -> Result<TargetRef, BoxError> {
        (self.create)()
    }
}

impl<F> fmt::Debug for FnTargetFactory<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTargetFactory")
            .field("target_type", &self.target_type.name())
            .field("prototype", &self.prototype)
            .finish_non_exhaustive()
    }
}

/// 构造期检查：工厂必须为原型。
fn require_prototype(
    factory: &dyn TargetFactory,
    strategy: &'static str,
) -> Result<(), ConfigError> {
    if factory.is_prototype() {
        Ok(())
    } else {
        Err(ConfigError::NotPrototype {
            type_name: factory.target_type().name().to_owned(),
            strategy,
        })
    }
}

/// 调用工厂创建实例，并把失败包装为调用期错误。
fn create_target(factory: &dyn TargetFactory) -> Result<TargetRef, InvocationError> {
    factory
        .create()
        .map_err(|source| InvocationError::TargetCreation {
            type_name: factory.target_type().name().to_owned(),
            source,
        })
}

/// 销毁实例；失败只记录日志。
fn destroy_target(factory: &dyn TargetFactory, target: TargetRef, strategy: &'static str) {
    if let Err(error) = factory.destroy(target) {
        let target_type = factory.target_type();
        tracing::warn!(
            target: crate::observability::targets::TARGET,
            strategy,
            target_type = target_type.name(),
            error = %error,
            "failed to destroy target instance"
        );
    }
}

/// 目标实例身份，用于识别“是否属于本源”。
fn identity(target: &TargetRef) -> usize {
    Arc::as_ptr(target) as *const () as usize
}
