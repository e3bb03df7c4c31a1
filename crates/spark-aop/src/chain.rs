//! 拦截链：按 (目标类型, 方法) 构建的有序拦截器列表及其缓存。
//!
//! # 设计背景（Why）
//! - 静态匹配只依赖方法身份与目标类型，结果可以在代理生命周期内复用；链在首次调用时惰性构建，
//!   以 (目标类型, 方法) 为键缓存；
//! - 缓存挂在通知器注册表上，共享同一注册表、且未注册自定义适配器的代理复用同一份链；
//!   注册了自定义适配器的代理各自缓存；
//! - 注册表每次变更都会递增 epoch，缓存项记录构建时的 epoch，不一致即视为过期。
//!
//! # 契约说明（What）
//! - 链内顺序与输入通知器顺序一致（输入应已按优先级排序）；
//! - 运行期匹配器随链项保存，由调用引擎在每次调用时求值；
//! - 引入通知器只要类型过滤器匹配就进入链，与方法无关。

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::advice::{
    AfterAdvice, AfterReturningAdvice, BeforeAdvice, MethodInterceptor, ThrowsAdvice,
};
use crate::advisor::{AdapterRegistry, Advisor, AdvisorBody};
use crate::descriptor::{MethodDescriptor, TypeDescriptor};
use crate::error::ConfigError;
use crate::introduction::IntroductionAdvisor;
use crate::matcher::MethodMatcher;
use crate::observability::targets;

/// 已适配、可直接执行的拦截器。
#[derive(Clone)]
pub enum Interceptor {
    Around(Arc<dyn MethodInterceptor>),
    Before(Arc<dyn BeforeAdvice>),
    AfterReturning(Arc<dyn AfterReturningAdvice>),
    AfterThrowing(Arc<dyn ThrowsAdvice>),
    After(Arc<dyn AfterAdvice>),
    Introduction(IntroductionAdvisor),
}

impl Interceptor {
    fn name(&self) -> &'static str {
        match self {
            Interceptor::Around(_) => "around",
            Interceptor::Before(_) => "before",
            Interceptor::AfterReturning(_) => "after_returning",
            Interceptor::AfterThrowing(_) => "after_throwing",
            Interceptor::After(_) => "after",
            Interceptor::Introduction(_) => "introduction",
        }
    }
}

impl PartialEq for Interceptor {
    fn eq(&self, other: &Self) -> bool {
        use std::ptr::addr_eq;
        match (self, other) {
            (Interceptor::Around(a), Interceptor::Around(b)) => {
                addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            (Interceptor::Before(a), Interceptor::Before(b)) => {
                addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            (Interceptor::AfterReturning(a), Interceptor::AfterReturning(b)) => {
                addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            (Interceptor::AfterThrowing(a), Interceptor::AfterThrowing(b)) => {
                addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            (Interceptor::After(a), Interceptor::After(b)) => addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            (Interceptor::Introduction(a), Interceptor::Introduction(b)) => a.same_as(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Interceptor::{}", self.name())
    }
}

/// 链中的一项。
#[derive(Clone, Debug, PartialEq)]
pub struct ChainEntry {
    advisor: Arc<str>,
    interceptor: Interceptor,
    runtime_matcher: Option<MethodMatcher>,
}

impl ChainEntry {
    pub fn advisor(&self) -> &str {
        &self.advisor
    }

    pub fn interceptor(&self) -> &Interceptor {
        &self.interceptor
    }

    /// 需要在调用期以实参求值的匹配器；静态匹配器不会出现在这里。
    pub fn runtime_matcher(&self) -> Option<&MethodMatcher> {
        self.runtime_matcher.as_ref()
    }
}

/// 不可变的拦截链，克隆只增加引用计数。
#[derive(Clone, Debug, PartialEq)]
pub struct Chain {
    entries: Arc<[ChainEntry]>,
}

impl Chain {
    pub fn empty() -> Self {
        Self {
            entries: Arc::from(Vec::new()),
        }
    }

    pub fn entries(&self) -> &[ChainEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 两条链是否为同一次构建的结果。
    pub fn ptr_eq(&self, other: &Chain) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }

    /// 链内通知器名称，按执行顺序。
    pub fn advisor_names(&self) -> Vec<&str> {
        self.entries.iter().map(ChainEntry::advisor).collect()
    }
}

/// 为 `method` 在 `target_type` 上构建拦截链。
///
/// # 教案式说明
/// - **逻辑（How）**：
///   1. 先判断是否存在适用于该类型的引入，供引入感知的匹配器使用；
///   2. 切点通知器依次经过类型过滤器与方法匹配器的静态阶段，通过者交给适配器转换；
///   3. 运行期匹配器随链项保存；引入通知器仅凭类型过滤器决定是否加入。
/// - **契约（What）**：任何通知无法适配时整体失败，返回 [`ConfigError::UnknownAdvice`]。
pub fn build_chain(
    target_type: &TypeDescriptor,
    method: &MethodDescriptor,
    advisors: &[Advisor],
    adapters: &AdapterRegistry,
) -> Result<Chain, ConfigError> {
    let has_introductions = advisors.iter().any(|advisor| match advisor.body() {
        AdvisorBody::Introduction(intro) => intro.class_filter().matches(target_type),
        AdvisorBody::Pointcut { .. } => false,
    });

    let mut entries = Vec::new();
    for advisor in advisors {
        match advisor.body() {
            AdvisorBody::Pointcut { pointcut, advice } => {
                if !pointcut.matches_statically(method, target_type, has_introductions) {
                    continue;
                }
                let matcher = pointcut.method_matcher();
                entries.push(ChainEntry {
                    advisor: advisor.shared_name(),
                    interceptor: adapters.adapt(advisor.name(), advice)?,
                    runtime_matcher: matcher.is_runtime().then(|| matcher.clone()),
                });
            }
            AdvisorBody::Introduction(intro) => {
                if intro.class_filter().matches(target_type) {
                    entries.push(ChainEntry {
                        advisor: advisor.shared_name(),
                        interceptor: Interceptor::Introduction(intro.clone()),
                        runtime_matcher: None,
                    });
                }
            }
        }
    }

    tracing::debug!(
        target: targets::CHAIN,
        method = %method,
        target_type = target_type.name(),
        interceptors = entries.len(),
        "built interception chain"
    );
    Ok(Chain {
        entries: entries.into(),
    })
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct ChainKey {
    target_type: TypeDescriptor,
    method: MethodDescriptor,
}

/// 按 (目标类型, 方法) 缓存的拦截链。
#[derive(Default)]
pub(crate) struct ChainCache {
    entries: DashMap<ChainKey, (u64, Chain)>,
}

impl ChainCache {
    /// 命中且 epoch 一致时直接返回，否则调用 `build` 重建并写回。
    ///
    /// 构建期间不持有分片锁，同一方法的并发重建可能各算一次，结果相同。
    pub(crate) fn get_or_build<F>(
        &self,
        epoch: u64,
        target_type: &TypeDescriptor,
        method: &MethodDescriptor,
        build: F,
    ) -> Result<Chain, ConfigError>
    where
        F: FnOnce() -> Result<Chain, ConfigError>,
    {
        let key = ChainKey {
            target_type: target_type.clone(),
            method: method.clone(),
        };
        if let Some(cached) = self.entries.get(&key) {
            let (cached_epoch, chain) = cached.value();
            if *cached_epoch == epoch {
                return Ok(chain.clone());
            }
            tracing::debug!(
                target: targets::CHAIN,
                method = %method,
                target_type = target_type.name(),
                cached_epoch = *cached_epoch,
                epoch,
                "cached chain is stale"
            );
        }
        let chain = build()?;
        self.entries.insert(key, (epoch, chain.clone()));
        Ok(chain)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice::{Advice, CustomAdvice};
    use crate::matcher::{ClassFilter, Pointcut};
    use crate::precedence::sort_advisors;

    fn calculator() -> TypeDescriptor {
        TypeDescriptor::new("Calculator")
    }

    fn add() -> MethodDescriptor {
        MethodDescriptor::new("Calculator", "add", ["i64", "i64"])
    }

    fn before(name: &str, pointcut: Pointcut) -> Advisor {
        Advisor::new(name, pointcut, Advice::before_fn(|_| Ok(())))
    }

    #[test]
    fn static_matching_selects_and_keeps_order() {
        let advisors = sort_advisors(&[
            before("all", Pointcut::TRUE).with_order(2),
            before("adds", Pointcut::method_names(["add"])).with_order(1),
            before("gets", Pointcut::method_names(["get*"])),
            before("elsewhere", Pointcut::for_class(ClassFilter::exact("Billing"))),
        ]);
        let chain = build_chain(&calculator(), &add(), &advisors, &AdapterRegistry::new()).unwrap();
        assert_eq!(chain.advisor_names(), ["adds", "all"]);
        assert!(chain.entries().iter().all(|e| e.runtime_matcher().is_none()));
    }

    #[test]
    fn runtime_matchers_travel_with_the_entry() {
        let dynamic = Pointcut::new(
            ClassFilter::True,
            MethodMatcher::dynamic(|_, _| true, |_, _, args| !args.is_empty()),
        );
        let chain = build_chain(
            &calculator(),
            &add(),
            &[before("dyn", dynamic)],
            &AdapterRegistry::new(),
        )
        .unwrap();
        assert!(chain.entries()[0].runtime_matcher().is_some());
    }

    #[test]
    fn introductions_apply_to_every_method_of_matching_types() {
        let intro = IntroductionAdvisor::from_fn(["Lockable"], |_, _| Ok(crate::Value::null()))
            .with_class_filter(ClassFilter::exact("Calculator"));
        let advisors = [Advisor::introduction("lock", intro)];
        let chain = build_chain(&calculator(), &add(), &advisors, &AdapterRegistry::new()).unwrap();
        assert_eq!(chain.advisor_names(), ["lock"]);

        let other = build_chain(
            &TypeDescriptor::new("Billing"),
            &add(),
            &advisors,
            &AdapterRegistry::new(),
        )
        .unwrap();
        assert!(other.is_empty());
    }

    #[test]
    fn unadaptable_advice_fails_the_build() {
        let advisors = [Advisor::new(
            "metrics",
            Pointcut::TRUE,
            Advice::Custom(CustomAdvice::new("metrics", ())),
        )];
        let err = build_chain(&calculator(), &add(), &advisors, &AdapterRegistry::new()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownAdvice { .. }));
    }

    #[test]
    fn cache_rebuilds_when_the_epoch_moves() {
        let cache = ChainCache::default();
        let mut builds = 0;
        for epoch in [1, 1, 2, 2] {
            cache
                .get_or_build(epoch, &calculator(), &add(), || {
                    builds += 1;
                    Ok(Chain::empty())
                })
                .unwrap();
        }
        assert_eq!(builds, 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cache_keys_include_the_target_type() {
        let cache = ChainCache::default();
        let mut builds = 0;
        for target_type in [calculator(), TypeDescriptor::new("Billing"), calculator()] {
            cache
                .get_or_build(1, &target_type, &add(), || {
                    builds += 1;
                    Ok(Chain::empty())
                })
                .unwrap();
        }
        assert_eq!(builds, 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn building_twice_from_one_snapshot_yields_the_same_chain() {
        let dynamic = Pointcut::new(
            ClassFilter::True,
            MethodMatcher::dynamic(|_, _| true, |_, _, args| !args.is_empty()),
        );
        let intro = IntroductionAdvisor::from_fn(["Lockable"], |_, _| Ok(crate::Value::null()));
        let advisors = sort_advisors(&[
            before("all", Pointcut::TRUE).with_order(2),
            before("dyn", dynamic).with_order(1),
            Advisor::introduction("lock", intro),
            Advisor::new(
                "audit",
                Pointcut::method_names(["add"]),
                Advice::after_returning_fn(|_, _| Ok(())),
            )
            .in_aspect("Audit", 0),
        ]);
        let adapters = AdapterRegistry::new();

        let first = build_chain(&calculator(), &add(), &advisors, &adapters).unwrap();
        let second = build_chain(&calculator(), &add(), &advisors, &adapters).unwrap();
        assert_eq!(first.len(), 4);
        assert!(!first.ptr_eq(&second));
        assert_eq!(first, second);
        assert_eq!(first.advisor_names(), second.advisor_names());
    }
}
