#![deny(unsafe_code)]
#![allow(clippy::result_large_err)]

//! # spark-aop
//!
//! ## 定位与职责（Why）
//! - 为任意目标对象提供“方法拦截链”运行时：根据声明式的切点（Pointcut）与通知（Advice），
//!   在每次调用时构建、排序并执行拦截器链，目标对象本身对拦截无感知；
//! - 依赖注入容器、注解/配置解析与代理代码生成均属于外部协作者，本 crate 只接收已经构建好的
//!   [`Advisor`] 列表与已解析的 [`MethodDescriptor`]。
//!
//! ## 架构嵌入（Where）
//! - [`matcher`]：`ClassFilter` + `MethodMatcher` 组成的两阶段（静态 + 动态）匹配模型；
//! - [`advisor`]、[`precedence`]：通知器注册表、适配器与优先级排序；
//! - [`chain`]：按 (目标类型, 方法) 构建并缓存拦截链；
//! - [`invocation`]：以显式游标推进的调用引擎，支持克隆重放与参数别名语义；
//! - [`target`]：单例、原型、池化、线程绑定、懒加载、热替换等目标源策略；
//! - [`introduction`]：让代理暴露目标未实现的接口，由委托对象承接调用；
//! - [`proxy`]：构建期与调用期的统一入口。
//!
//! ## 执行模型（How）
//! - 调用完全在调用方线程同步执行，链本身不引入并发；
//! - 唯一可能的挂起点是池化目标源在资源耗尽时的等待，受 [`config::MaxWait`] 约束。

pub mod advice;
pub mod advisor;
pub mod chain;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod introduction;
pub mod invocation;
pub mod matcher;
pub mod observability;
pub mod precedence;
pub mod proxy;
pub mod target;
pub mod value;

pub use advice::{
    Advice, AdviceKind, AfterAdvice, AfterReturningAdvice, BeforeAdvice, CustomAdvice,
    MethodInterceptor, ThrowsAdvice,
};
pub use advisor::{
    AdapterRegistry, AdvisorAdapter, AdvisorRegistry, AspectDeclaration, Advisor, AdvisorBody,
    HIGHEST_PRECEDENCE, LOWEST_PRECEDENCE, Precedence,
};
pub use chain::{Chain, ChainEntry, Interceptor, build_chain};
pub use config::{MaxWait, PoolConfig, ProxySettings};
pub use context::current_proxy;
pub use descriptor::{MethodDescriptor, TypeDescriptor};
pub use error::{BoxError, ConfigError, InvocationError};
pub use introduction::{IntroductionAdvisor, IntroductionDelegate};
pub use invocation::{InvocationState, MethodInvocation};
pub use matcher::{ClassFilter, ClassPredicate, MethodMatcher, MethodPredicate, Pointcut};
pub use precedence::sort_advisors;
pub use proxy::{Proxy, ProxyFactory, build_proxy};
pub use target::{
    EmptyTargetSource, FnTargetFactory, HotSwappableTargetSource, LazyInitTargetSource,
    PooledTargetSource, PoolingStats, PrototypeTargetSource, SingletonTargetSource, Target,
    TargetFactory, TargetRef, TargetSource, ThreadLocalStats, ThreadLocalTargetSource,
};
pub use value::{Arguments, Attributes, Value};
