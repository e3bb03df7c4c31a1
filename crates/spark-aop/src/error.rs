//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 区分“构建期配置错误”与“调用期错误”两大类：前者在代理构建或通知器注册时即失败，
//!   后者沿 `proceed()` 调用栈原样回传；
//! - 为每个变体提供稳定错误码（`aop.*`），便于日志与告警聚合。
//!
//! ## 设计要求（What）
//! - 所有错误类型派生 `thiserror::Error`，保持与 `std::error::Error` 生态兼容；
//! - 目标方法或通知抛出的原始错误以 [`InvocationError::Raised`] 装箱保存，调用方可通过
//!   [`InvocationError::downcast_ref`] 取回原始类型，不做任何改写。

use std::time::Duration;

use thiserror::Error;

/// 跨线程可传递的装箱错误，承载目标对象、通知或工厂产生的任意错误。
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 构建期配置错误。
///
/// # 教案式说明
/// - **意图 (Why)**：配置问题必须在代理构建时暴露，绝不降级为调用期的静默失败；
/// - **契约 (What)**：任一变体出现都意味着代理（或通知器变更）未生效，调用方应中止装配流程；
/// - **执行 (How)**：`code()` 返回 `aop.config.*` 稳定错误码，`Display` 给出带上下文的描述。
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 通知器携带的自定义通知没有任何已注册的适配器支持。
    #[error("advisor `{advisor}` carries advice of kind `{kind}` that no registered adapter supports")]
    UnknownAdvice { advisor: String, kind: String },

    /// 引入通知器承诺的接口未被其委托对象实现。
    #[error(
        "introduction `{advisor}` promises interface `{interface}` that its delegate does not implement"
    )]
    UnimplementedInterface { advisor: String, interface: String },

    /// 需要“每次请求新实例”的目标源绑定到了非原型工厂。
    #[error(
        "target factory for `{type_name}` is not a prototype; {strategy} target sources need a fresh instance per request"
    )]
    NotPrototype {
        type_name: String,
        strategy: &'static str,
    },

    /// 池配置自相矛盾。
    #[error("invalid pool configuration: {reason}")]
    InvalidPool { reason: String },

    /// 代理配置已冻结，禁止修改通知器。
    #[error("proxy configuration is frozen; advisor changes are rejected")]
    Frozen,

    /// 配置文本无法解析。
    #[error("failed to parse configuration")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::UnknownAdvice { .. } => "aop.config.unknown_advice",
            ConfigError::UnimplementedInterface { .. } => "aop.config.unimplemented_interface",
            ConfigError::NotPrototype { .. } => "aop.config.not_prototype",
            ConfigError::InvalidPool { .. } => "aop.config.invalid_pool",
            ConfigError::Frozen => "aop.config.frozen",
            ConfigError::Parse(_) => "aop.config.parse",
        }
    }
}

/// 调用期错误。
///
/// # 教案式说明
/// - **意图 (Why)**：拦截链不吞掉、不包装业务错误；引擎自身只在协议违例与资源耗尽时产生新错误；
/// - **契约 (What)**：
///   - `Raised`：目标方法或通知产生的原始错误，身份保持不变；
///   - `NoTarget`/`Protocol`：调用协议违例，属于编程错误，立即暴露；
///   - `PoolExhausted`/`PoolClosed`/`TargetCreation`：目标源层面的资源错误；
///   - `Configuration`：调用期才发现的配置问题（例如共享注册表在代理构建后被注入了无法适配的通知）。
/// - **风险 (Trade-offs)**：`Raised` 采用装箱存储，换取对任意错误类型的透明承载。
#[derive(Debug, Error)]
pub enum InvocationError {
    /// 目标或通知抛出的原始错误。
    #[error("{0}")]
    Raised(BoxError),

    /// 目标对象不支持被调用的方法。
    #[error("method `{method}` is not implemented by the target")]
    UnsupportedMethod { method: String },

    /// 链已走到尽头但没有可调用的目标。
    #[error("no target available to invoke `{method}`")]
    NoTarget { method: String },

    /// 调用协议违例，例如在原调用结束后继续推进其克隆。
    #[error("invocation protocol violated: {detail}")]
    Protocol { detail: String },

    /// 池化目标源在等待上限内未能借出实例。
    #[error("target pool exhausted after waiting {waited:?}")]
    PoolExhausted { waited: Duration },

    /// 池已关闭。
    #[error("target pool is closed")]
    PoolClosed,

    /// 目标工厂创建实例失败。
    #[error("failed to create target of type `{type_name}`")]
    TargetCreation {
        type_name: String,
        #[source]
        source: BoxError,
    },

    /// 调用期暴露的配置错误。
    #[error(transparent)]
    Configuration(#[from] ConfigError),
}

impl InvocationError {
    /// 将任意错误装箱为 [`InvocationError::Raised`]。
    pub fn raised<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        InvocationError::Raised(Box::new(error))
    }

    /// 若为 `Raised`，尝试取回原始错误类型。
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            InvocationError::Raised(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            InvocationError::Raised(_) => "aop.call.raised",
            InvocationError::UnsupportedMethod { .. } => "aop.call.unsupported_method",
            InvocationError::NoTarget { .. } => "aop.call.no_target",
            InvocationError::Protocol { .. } => "aop.call.protocol",
            InvocationError::PoolExhausted { .. } => "aop.pool.exhausted",
            InvocationError::PoolClosed => "aop.pool.closed",
            InvocationError::TargetCreation { .. } => "aop.target.creation",
            InvocationError::Configuration(inner) => inner.code(),
        }
    }
}
