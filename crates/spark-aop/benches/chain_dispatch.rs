use criterion::{Criterion, black_box};
use spark_aop::{
    Advice, Advisor, InvocationError, MethodDescriptor, Pointcut, Proxy, ProxyFactory,
    SingletonTargetSource, Target, TargetRef, TypeDescriptor, Value,
};
use std::{env, sync::Arc, time::Duration};

/// 代理分派基准：衡量缓存命中时一次代理调用的固定开销。
///
/// # 设计背景（Why）
/// - 调用路径上的成本集中在取链（缓存查找与 epoch 比较）、创建调用记录与推进游标；
/// - 对比“无通知”“单个前置通知”“前置 + 环绕 + 后置”三种链长，观察开销是否随链长线性增长。
///
/// # 逻辑解析（How）
/// - 目标为一个只做整数加法的最小实现，避免目标本身的耗时掩盖拦截开销；
/// - 每组基准在计时前先调用一次，保证拦截链已经进入缓存。
fn bench_chain_dispatch(c: &mut Criterion) {
    let method = MethodDescriptor::new("Adder", "add", ["i64", "i64"]);
    let cases = [
        ("dispatch_no_advice", proxy_with(Vec::new())),
        ("dispatch_before", proxy_with(vec![before("before")])),
        (
            "dispatch_before_around_after",
            proxy_with(vec![before("before"), around("around"), after("after")]),
        ),
    ];

    for (name, proxy) in &cases {
        let warm = proxy.invoke(&method, operands());
        assert!(warm.is_ok(), "warm-up call failed for {name}");
        c.bench_function(name, |b| {
            b.iter(|| black_box(proxy.invoke(&method, operands())));
        });
    }
}

/// 只构建一次链、之后全部命中缓存的取链开销；用于从分派开销中剥离出缓存查找部分。
fn bench_chain_lookup(c: &mut Criterion) {
    let method = MethodDescriptor::new("Adder", "add", ["i64", "i64"]);
    let proxy = proxy_with(vec![before("before"), around("around"), after("after")]);
    let warm = proxy.chain_for(&method);
    assert!(warm.is_ok(), "chain lookup failed during warm-up");
    c.bench_function("chain_lookup_cached", |b| {
        b.iter(|| black_box(proxy.chain_for(&method)));
    });
}

/// `--quick` 缩短采样，供 CI 冒烟运行。
fn configured_criterion() -> Criterion {
    let criterion = Criterion::default();
    if !env::args().skip(1).any(|arg| arg == "--quick") {
        return criterion;
    }
    criterion
        .sample_size(10)
        .warm_up_time(Duration::from_millis(100))
        .measurement_time(Duration::from_millis(250))
}

fn main() {
    let mut criterion = configured_criterion();
    bench_chain_dispatch(&mut criterion);
    bench_chain_lookup(&mut criterion);
    criterion.final_summary();
}

struct Adder;

impl Target for Adder {
    fn invoke(&self, _method: &MethodDescriptor, args: &[Value]) -> Result<Value, InvocationError> {
        let sum: i64 = args.iter().filter_map(|v| v.downcast_ref::<i64>()).sum();
        Ok(Value::new(sum))
    }
}

fn operands() -> Vec<Value> {
    vec![Value::new(2_i64), Value::new(3_i64)]
}

fn proxy_with(advisors: Vec<Advisor>) -> Proxy {
    let target: TargetRef = Arc::new(Adder);
    let source = SingletonTargetSource::new(target, TypeDescriptor::new("Adder"));
    let factory = advisors
        .into_iter()
        .fold(ProxyFactory::new(source), ProxyFactory::add_advisor);
    match factory.build() {
        Ok(proxy) => proxy,
        Err(error) => panic!("benchmark proxy failed to build: {error}"),
    }
}

fn before(name: &str) -> Advisor {
    Advisor::new(name, Pointcut::TRUE, Advice::before_fn(|_| Ok(())))
}

fn around(name: &str) -> Advisor {
    Advisor::new(
        name,
        Pointcut::TRUE,
        Advice::around_fn(|invocation| invocation.proceed()),
    )
}

fn after(name: &str) -> Advisor {
    Advisor::new(name, Pointcut::TRUE, Advice::after_fn(|_, _| Ok(())))
}
