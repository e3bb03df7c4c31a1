//! 引入：代理暴露目标未实现的接口，调用由委托承接。

mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use spark_aop::{
    Advice, Advisor, AdvisorRegistry, ClassFilter, InvocationError, IntroductionAdvisor,
    MethodDescriptor, MethodMatcher, Pointcut, Value,
};
use support::{add, args, as_i64, singleton_calculator, target_calls};

const AUDITABLE: &str = "Auditable";

fn last_audit() -> MethodDescriptor {
    MethodDescriptor::new(AUDITABLE, "last_audit", Vec::<&str>::new())
}

fn auditable() -> IntroductionAdvisor {
    IntroductionAdvisor::from_fn([AUDITABLE], |method, _args| match method.name() {
        "last_audit" => Ok(Value::new("never".to_owned())),
        _ => Err(InvocationError::UnsupportedMethod {
            method: method.signature(),
        }),
    })
}

#[test]
fn introduced_methods_are_routed_to_the_delegate() {
    let (factory, calculator) = singleton_calculator();
    let proxy = factory
        .add_advisor(Advisor::introduction("audit", auditable()))
        .build()
        .expect("proxy");

    assert!(proxy.implements(AUDITABLE));
    assert!(proxy.implements("Calculator"));
    assert!(!proxy.implements("Lockable"));
    assert!(proxy.proxied_interfaces().iter().any(|i| &**i == AUDITABLE));

    let audit = proxy.invoke(&last_audit(), Vec::new()).expect("last_audit");
    assert_eq!(audit.downcast_ref::<String>().map(String::as_str), Some("never"));
    assert_eq!(target_calls(&calculator), 0);

    let sum = proxy.invoke(&add(), args(2, 3)).expect("add");
    assert_eq!(as_i64(&sum), 5);
    assert_eq!(target_calls(&calculator), 1);
}

#[test]
fn advice_ordered_before_the_introduction_also_wraps_introduced_methods() {
    let counter = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&counter);
    let (factory, _calculator) = singleton_calculator();
    let proxy = factory
        .add_advisor(Advisor::introduction("audit", auditable()).with_order(10))
        .add_advisor(
            Advisor::new(
                "watch-audits",
                Pointcut::new(ClassFilter::True, MethodMatcher::declared_by(AUDITABLE)),
                Advice::before_fn(move |_| {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .with_order(0),
        )
        .build()
        .expect("proxy");

    proxy.invoke(&last_audit(), Vec::new()).expect("last_audit");
    proxy.invoke(&add(), args(2, 3)).expect("add");
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn promising_an_interface_the_delegate_lacks_fails_the_build() {
    let (factory, _calculator) = singleton_calculator();
    let overpromised = auditable().with_interfaces([AUDITABLE, "Lockable"]);
    let err = factory
        .add_advisor(Advisor::introduction("audit", overpromised.clone()))
        .build()
        .err()
        .expect("rejected");
    assert_eq!(err.code(), "aop.config.unimplemented_interface");
    assert!(err.to_string().contains("Lockable"));

    let registry = AdvisorRegistry::new();
    let err = registry
        .register_advisor(Advisor::introduction("audit", overpromised))
        .unwrap_err();
    assert_eq!(err.code(), "aop.config.unimplemented_interface");
    assert!(registry.is_empty());
}

#[test]
fn class_filters_limit_where_interfaces_are_introduced() {
    let (factory, _calculator) = singleton_calculator();
    let proxy = factory
        .add_advisor(Advisor::introduction(
            "audit",
            auditable().with_class_filter(ClassFilter::exact("Ledger")),
        ))
        .build()
        .expect("proxy");

    assert!(!proxy.implements(AUDITABLE));
    let err = proxy.invoke(&last_audit(), Vec::new()).unwrap_err();
    assert_eq!(err.code(), "aop.call.unsupported_method");
}
