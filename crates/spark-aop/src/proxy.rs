//! 代理入口：构建期装配与调用期分派。
//!
//! # 设计背景（Why）
//! - 代理的物理生成（代码生成、动态类型）不在本 crate 范围内；[`Proxy`] 是生成代码应当调用的
//!   统一入口：给定方法描述与参数，完成取目标、取链、推进调用、归还目标的完整流程；
//! - 装配期的所有配置错误（未知通知、引入接口不符）都在 [`ProxyFactory::build`] 暴露。
//!
//! # 契约说明（What）
//! - 目标在推进拦截链之前取得，调用结束后（包括错误回溯）由租约守卫归还；
//! - 拦截链按 (目标类型, 方法) 缓存，注册表 epoch 变化后自动重建；未注册自定义适配器的代理
//!   共用注册表上的缓存，注册了自定义适配器的代理使用自己的缓存；
//! - 冻结的代理拒绝运行中增删通知器。

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::advisor::{AdapterRegistry, Advisor, AdvisorAdapter, AdvisorBody, AdvisorRegistry};
use crate::chain::{Chain, ChainCache, build_chain};
use crate::config::ProxySettings;
use crate::context;
use crate::descriptor::{MethodDescriptor, TypeDescriptor};
use crate::error::{ConfigError, InvocationError};
use crate::invocation::MethodInvocation;
use crate::observability::targets;
use crate::target::{TargetRef, TargetSource};
use crate::value::Value;

/// 目标源无法给出类型时使用的占位类型名。
const UNTYPED: &str = "<untyped>";

/// 已构建的代理，克隆只增加引用计数。
#[derive(Clone)]
pub struct Proxy {
    inner: Arc<ProxyInner>,
}

struct ProxyInner {
    target_source: Arc<dyn TargetSource>,
    target_type: TypeDescriptor,
    registry: Arc<AdvisorRegistry>,
    adapters: AdapterRegistry,
    interfaces: Vec<Arc<str>>,
    settings: ProxySettings,
    /// 注册了自定义适配器时使用的私有链缓存。
    cache: ChainCache,
}

impl Proxy {
    /// 调用入口。
    ///
    /// # 教案式说明
    /// - **逻辑（How）**：
    ///   1. 取得（或复用缓存的）拦截链；
    ///   2. 通过租约从目标源取得目标，租约析构时归还；
    ///   3. 按需暴露当前代理，创建 [`MethodInvocation`] 并推进；
    /// - **契约（What）**：目标与通知产生的错误原样返回；装配问题以
    ///   [`InvocationError::Configuration`] 返回。
    pub fn invoke(
        &self,
        method: &MethodDescriptor,
        args: Vec<Value>,
    ) -> Result<Value, InvocationError> {
        let chain = self.chain_for(method)?;
        tracing::trace!(
            target: targets::INVOCATION,
            method = %method,
            interceptors = chain.len(),
            "dispatching proxied call"
        );

        let lease = TargetLease::acquire(self.inner.target_source.as_ref())?;
        let _exposure = self
            .inner
            .settings
            .expose_proxy
            .then(|| context::expose(self.clone()));

        let mut invocation = MethodInvocation::new(
            self.clone(),
            lease.target.clone(),
            self.inner.target_type.clone(),
            method.clone(),
            args,
            chain,
            Arc::clone(&lease.released),
        );
        invocation.proceed()
    }

    /// 当前生效的拦截链。
    ///
    /// 自定义适配器会影响链的内容，因此只有适配器为空的代理才使用注册表上的共享缓存。
    pub fn chain_for(&self, method: &MethodDescriptor) -> Result<Chain, ConfigError> {
        let inner = &self.inner;
        let epoch = inner.registry.epoch();
        let build = || {
            build_chain(
                &inner.target_type,
                method,
                &inner.registry.snapshot(),
                &inner.adapters,
            )
        };
        if !inner.settings.cache_chains {
            return build();
        }
        let cache = if inner.adapters.is_empty() {
            inner.registry.shared_chains()
        } else {
            &inner.cache
        };
        cache.get_or_build(epoch, &inner.target_type, method, build)
    }

    /// 运行中追加通知器。冻结时返回 [`ConfigError::Frozen`]。
    pub fn add_advisor(&self, advisor: Advisor) -> Result<(), ConfigError> {
        if self.inner.settings.frozen {
            return Err(ConfigError::Frozen);
        }
        ensure_adaptable(&self.inner.adapters, &advisor)?;
        self.inner.registry.register_advisor(advisor)?;
        Ok(())
    }

    /// 运行中按名称移除通知器，返回是否确有移除。
    pub fn remove_advisor(&self, name: &str) -> Result<bool, ConfigError> {
        if self.inner.settings.frozen {
            return Err(ConfigError::Frozen);
        }
        Ok(self.inner.registry.remove_advisor(name).is_some())
    }

    /// 代理是否可以当作 `interface` 使用：目标类型、附加接口或被引入的接口。
    pub fn implements(&self, interface: &str) -> bool {
        self.inner.target_type.is_assignable_to(interface)
            || self.inner.interfaces.iter().any(|i| &**i == interface)
            || self
                .introduced_interfaces()
                .iter()
                .any(|i| &**i == interface)
    }

    /// 代理暴露的全部接口，按目标接口、附加接口、引入接口的顺序去重。
    pub fn proxied_interfaces(&self) -> Vec<Arc<str>> {
        let mut all = self.inner.target_type.all_interfaces();
        for interface in self
            .inner
            .interfaces
            .iter()
            .cloned()
            .chain(self.introduced_interfaces())
        {
            if !all.contains(&interface) {
                all.push(interface);
            }
        }
        all
    }

    fn introduced_interfaces(&self) -> Vec<Arc<str>> {
        self.inner
            .registry
            .snapshot()
            .iter()
            .filter_map(|advisor| match advisor.body() {
                AdvisorBody::Introduction(intro)
                    if intro.class_filter().matches(&self.inner.target_type) =>
                {
                    Some(intro.interfaces().to_vec())
                }
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn target_source(&self) -> &Arc<dyn TargetSource> {
        &self.inner.target_source
    }

    pub fn target_type(&self) -> &TypeDescriptor {
        &self.inner.target_type
    }

    pub fn registry(&self) -> &Arc<AdvisorRegistry> {
        &self.inner.registry
    }

    pub fn settings(&self) -> &ProxySettings {
        &self.inner.settings
    }

    /// 两个句柄是否指向同一个代理。
    pub fn ptr_eq(&self, other: &Proxy) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("target_type", &self.inner.target_type.name())
            .field("registry", &self.inner.registry)
            .field("settings", &self.inner.settings)
            .field("private_chains", &self.inner.cache.len())
            .finish()
    }
}

/// 代理构建器。
///
/// # 教案式说明
/// - **契约（What）**：
///   - 默认使用独享的注册表；[`ProxyFactory::with_registry`] 可让多个代理共享同一注册表；
///   - `build` 先校验待加入的通知器（适配、引入接口），全部通过后才写入注册表，
///     再校验注册表中已有的通知器，任一失败则不产生代理。
pub struct ProxyFactory {
    target_source: Arc<dyn TargetSource>,
    target_type: Option<TypeDescriptor>,
    registry: Arc<AdvisorRegistry>,
    pending: Vec<Advisor>,
    adapters: AdapterRegistry,
    interfaces: Vec<Arc<str>>,
    settings: ProxySettings,
}

impl ProxyFactory {
    pub fn new<S: TargetSource>(target_source: S) -> Self {
        Self::from_source(Arc::new(target_source))
    }

    pub fn from_source(target_source: Arc<dyn TargetSource>) -> Self {
        Self {
            target_source,
            target_type: None,
            registry: Arc::new(AdvisorRegistry::new()),
            pending: Vec::new(),
            adapters: AdapterRegistry::new(),
            interfaces: Vec::new(),
            settings: ProxySettings::default(),
        }
    }

    pub fn with_registry(mut self, registry: Arc<AdvisorRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// 覆盖目标源给出的类型。
    pub fn with_target_type(mut self, target_type: TypeDescriptor) -> Self {
        self.target_type = Some(target_type);
        self
    }

    pub fn add_advisor(mut self, advisor: Advisor) -> Self {
        self.pending.push(advisor);
        self
    }

    /// 声明代理额外实现的接口。
    pub fn add_interface(mut self, interface: impl Into<Arc<str>>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn register_adapter(mut self, adapter: Arc<dyn AdvisorAdapter>) -> Self {
        self.adapters.register(adapter);
        self
    }

    pub fn settings(mut self, settings: ProxySettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> Result<Proxy, ConfigError> {
        for advisor in &self.pending {
            ensure_adaptable(&self.adapters, advisor)?;
            if let AdvisorBody::Introduction(intro) = advisor.body() {
                intro.validate_interfaces(advisor.name())?;
            }
        }
        for advisor in self.pending {
            self.registry.register_advisor(advisor)?;
        }
        for advisor in self.registry.snapshot().iter() {
            ensure_adaptable(&self.adapters, advisor)?;
        }

        let target_type = self
            .target_type
            .or_else(|| self.target_source.target_type())
            .unwrap_or_else(|| TypeDescriptor::new(UNTYPED));
        tracing::debug!(
            target: targets::REGISTRY,
            target_type = target_type.name(),
            advisors = self.registry.len(),
            "built proxy"
        );
        Ok(Proxy {
            inner: Arc::new(ProxyInner {
                target_source: self.target_source,
                target_type,
                registry: self.registry,
                adapters: self.adapters,
                interfaces: self.interfaces,
                settings: self.settings,
                cache: ChainCache::default(),
            }),
        })
    }
}

/// 以共享注册表为目标源构建代理。
pub fn build_proxy(
    target_type: TypeDescriptor,
    target_source: Arc<dyn TargetSource>,
    registry: Arc<AdvisorRegistry>,
) -> Result<Proxy, ConfigError> {
    ProxyFactory::from_source(target_source)
        .with_registry(registry)
        .with_target_type(target_type)
        .build()
}

fn ensure_adaptable(adapters: &AdapterRegistry, advisor: &Advisor) -> Result<(), ConfigError> {
    match advisor.body() {
        AdvisorBody::Pointcut { advice, .. } => adapters.adapt(advisor.name(), advice).map(drop),
        AdvisorBody::Introduction(_) => Ok(()),
    }
}

/// 一次调用对目标的租约，析构时归还。
struct TargetLease<'a> {
    source: &'a dyn TargetSource,
    target: Option<TargetRef>,
    needs_release: bool,
    released: Arc<AtomicBool>,
}

impl<'a> TargetLease<'a> {
    fn acquire(source: &'a dyn TargetSource) -> Result<Self, InvocationError> {
        let needs_release = !source.is_static();
        let target = source.get_target()?;
        Ok(Self {
            source,
            target,
            needs_release,
            released: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl Drop for TargetLease<'_> {
    fn drop(&mut self) {
        if !self.needs_release {
            return;
        }
        if let Some(target) = self.target.take() {
            self.released.store(true, Ordering::Release);
            self.source.release_target(target);
        }
    }
}
