//! 代理装配：运行中增删通知器、冻结、自定义通知适配与共享注册表。

mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use spark_aop::{
    Advice, Advisor, AdvisorAdapter, AdvisorRegistry, ConfigError, CustomAdvice, Interceptor,
    InvocationError, MethodInterceptor, MethodInvocation, Pointcut, ProxyFactory, ProxySettings,
    SingletonTargetSource, TargetRef, Value, build_proxy,
};
use support::{Calculator, add, args, as_i64, calculator_type, singleton_calculator};

fn counting_before(name: &str, counter: &Arc<AtomicUsize>) -> Advisor {
    let counter = Arc::clone(counter);
    Advisor::new(
        name,
        Pointcut::TRUE,
        Advice::before_fn(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    )
}

#[test]
fn advisors_added_at_runtime_take_effect_on_the_next_call() {
    let counter = Arc::new(AtomicUsize::new(0));
    let (factory, _calculator) = singleton_calculator();
    let proxy = factory.build().expect("proxy");

    assert!(proxy.chain_for(&add()).expect("chain").is_empty());
    proxy.invoke(&add(), args(2, 3)).expect("add");

    proxy
        .add_advisor(counting_before("count", &counter))
        .expect("add advisor");
    assert_eq!(proxy.chain_for(&add()).expect("chain").len(), 1);
    proxy.invoke(&add(), args(2, 3)).expect("add");
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    assert!(proxy.remove_advisor("count").expect("remove"));
    assert!(!proxy.remove_advisor("count").expect("remove again"));
    proxy.invoke(&add(), args(2, 3)).expect("add");
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn frozen_proxies_reject_advisor_changes() {
    let counter = Arc::new(AtomicUsize::new(0));
    let (factory, _calculator) = singleton_calculator();
    let proxy = factory
        .settings(ProxySettings {
            frozen: true,
            ..ProxySettings::default()
        })
        .add_advisor(counting_before("count", &counter))
        .build()
        .expect("proxy");

    let err = proxy
        .add_advisor(counting_before("late", &counter))
        .unwrap_err();
    assert!(matches!(err, ConfigError::Frozen));
    assert_eq!(
        proxy.remove_advisor("count").unwrap_err().code(),
        "aop.config.frozen"
    );

    proxy.invoke(&add(), args(2, 3)).expect("add");
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn uncached_chains_are_rebuilt_per_call() {
    let counter = Arc::new(AtomicUsize::new(0));
    let (factory, _calculator) = singleton_calculator();
    let proxy = factory
        .settings(ProxySettings {
            cache_chains: false,
            ..ProxySettings::default()
        })
        .add_advisor(counting_before("count", &counter))
        .build()
        .expect("proxy");

    for _ in 0..3 {
        proxy.invoke(&add(), args(2, 3)).expect("add");
    }
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[test]
fn rebuilt_chains_keep_the_same_order() {
    let counter = Arc::new(AtomicUsize::new(0));
    let (factory, _calculator) = singleton_calculator();
    let proxy = factory
        .settings(ProxySettings {
            cache_chains: false,
            ..ProxySettings::default()
        })
        .add_advisor(counting_before("late", &counter).with_order(5))
        .add_advisor(counting_before("early", &counter).with_order(-5))
        .add_advisor(counting_before("unordered", &counter))
        .build()
        .expect("proxy");

    let first = proxy.chain_for(&add()).expect("chain");
    let second = proxy.chain_for(&add()).expect("chain");
    assert!(!first.ptr_eq(&second));
    assert_eq!(first, second);
    assert_eq!(first.advisor_names(), ["early", "late", "unordered"]);
}

/// 把 `offset` 自定义通知转换为“结果加偏移量”的环绕拦截器。
struct OffsetAdapter;

struct Offset(i64);

impl MethodInterceptor for Offset {
    fn invoke(&self, invocation: &mut MethodInvocation) -> Result<Value, InvocationError> {
        let value = invocation.proceed()?;
        Ok(Value::new(as_i64(&value) + self.0))
    }
}

impl AdvisorAdapter for OffsetAdapter {
    fn supports(&self, advice: &CustomAdvice) -> bool {
        advice.kind() == "offset"
    }

    fn interceptor(&self, advice: &CustomAdvice) -> Result<Interceptor, ConfigError> {
        let offset = advice.payload::<i64>().copied().unwrap_or_default();
        Ok(Interceptor::Around(Arc::new(Offset(offset))))
    }
}

fn offset_advisor(offset: i64) -> Advisor {
    Advisor::new(
        "offset",
        Pointcut::TRUE,
        Advice::Custom(CustomAdvice::new("offset", offset)),
    )
}

#[test]
fn custom_advice_without_an_adapter_fails_the_build() {
    let (factory, _calculator) = singleton_calculator();
    let err = factory.add_advisor(offset_advisor(10)).build().err().expect("rejected");
    assert_eq!(err.code(), "aop.config.unknown_advice");
    assert!(err.to_string().contains("offset"));
}

#[test]
fn registered_adapters_bring_custom_advice_into_the_chain() {
    let (factory, _calculator) = singleton_calculator();
    let proxy = factory
        .register_adapter(Arc::new(OffsetAdapter))
        .add_advisor(offset_advisor(10))
        .build()
        .expect("proxy");

    let result = proxy.invoke(&add(), args(2, 3)).expect("add");
    assert_eq!(as_i64(&result), 15);
}

#[test]
fn failed_builds_leave_a_shared_registry_untouched() {
    let registry = Arc::new(AdvisorRegistry::new());
    let counter = Arc::new(AtomicUsize::new(0));
    let (factory, _calculator) = singleton_calculator();
    let built = factory
        .with_registry(Arc::clone(&registry))
        .add_advisor(counting_before("count", &counter))
        .add_advisor(offset_advisor(1))
        .build();
    assert!(built.is_err());
    assert!(registry.is_empty());
    assert_eq!(registry.epoch(), 0);
}

#[test]
fn proxies_sharing_a_registry_see_the_same_advisors() {
    let registry = Arc::new(AdvisorRegistry::new());
    let counter = Arc::new(AtomicUsize::new(0));
    let source = |id| {
        let target: TargetRef = Arc::new(Calculator::new(id));
        Arc::new(SingletonTargetSource::new(target, calculator_type()))
    };
    let first = build_proxy(calculator_type(), source(1), Arc::clone(&registry)).expect("first");
    let second = build_proxy(calculator_type(), source(2), Arc::clone(&registry)).expect("second");

    first.invoke(&add(), args(2, 3)).expect("warm cache");
    registry
        .register_advisor(counting_before("count", &counter))
        .expect("register");

    first.invoke(&add(), args(2, 3)).expect("add");
    second.invoke(&add(), args(2, 3)).expect("add");
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[test]
fn proxies_sharing_a_registry_reuse_built_chains() {
    let registry = Arc::new(AdvisorRegistry::new());
    let counter = Arc::new(AtomicUsize::new(0));
    registry
        .register_advisor(counting_before("count", &counter))
        .expect("register");
    let source = |id| {
        let target: TargetRef = Arc::new(Calculator::new(id));
        Arc::new(SingletonTargetSource::new(target, calculator_type()))
    };
    let first = build_proxy(calculator_type(), source(1), Arc::clone(&registry)).expect("first");
    let second = build_proxy(calculator_type(), source(2), Arc::clone(&registry)).expect("second");

    let chain = first.chain_for(&add()).expect("chain");
    assert!(chain.ptr_eq(&second.chain_for(&add()).expect("chain")));

    registry
        .register_advisor(counting_before("another", &counter))
        .expect("register");
    let rebuilt = second.chain_for(&add()).expect("chain");
    assert!(!rebuilt.ptr_eq(&chain));
    assert!(rebuilt.ptr_eq(&first.chain_for(&add()).expect("chain")));

    let adapted = ProxyFactory::from_source(source(3))
        .with_registry(Arc::clone(&registry))
        .register_adapter(Arc::new(OffsetAdapter))
        .build()
        .expect("adapted");
    let private = adapted.chain_for(&add()).expect("chain");
    assert_eq!(private, rebuilt);
    assert!(!private.ptr_eq(&rebuilt));
}

#[test]
fn unadaptable_advice_injected_after_build_surfaces_at_call_time() {
    let registry = Arc::new(AdvisorRegistry::new());
    let (factory, _calculator) = singleton_calculator();
    let proxy = factory
        .with_registry(Arc::clone(&registry))
        .build()
        .expect("proxy");

    registry
        .register_advisor(offset_advisor(5))
        .expect("registry accepts custom advice");
    let err = proxy.invoke(&add(), args(2, 3)).unwrap_err();
    assert!(matches!(err, InvocationError::Configuration(_)));
    assert_eq!(err.code(), "aop.config.unknown_advice");
}

#[test]
fn untyped_sources_fall_back_to_a_placeholder_type() {
    let proxy = ProxyFactory::new(spark_aop::EmptyTargetSource::new())
        .build()
        .expect("proxy");
    assert_eq!(proxy.target_type().name(), "<untyped>");
    assert!(!proxy.implements("Calculator"));

    let typed = ProxyFactory::new(spark_aop::EmptyTargetSource::new())
        .with_target_type(calculator_type())
        .add_interface("Serializable")
        .build()
        .expect("proxy");
    assert!(typed.implements("Calculator"));
    assert!(typed.implements("Serializable"));
    assert_eq!(
        typed
            .proxied_interfaces()
            .iter()
            .map(|i| &**i)
            .collect::<Vec<_>>(),
        ["Calculator", "Serializable"]
    );
}
