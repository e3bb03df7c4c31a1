use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::config::{MaxWait, PoolConfig};
use crate::descriptor::TypeDescriptor;
use crate::error::{ConfigError, InvocationError};
use crate::introduction::IntroductionAdvisor;
use crate::observability::targets;

use super::stats::{PoolingStats, PoolingStatsDelegate};
use super::{
    TargetFactory, TargetRef, TargetSource, create_target, destroy_target, identity,
    require_prototype,
};

const STRATEGY: &str = "pooled";

/// 有界对象池目标源。
///
/// # 教案式说明
/// - **意图（Why）**：目标对象非线程安全或创建昂贵时，以有限数量的实例服务并发调用；
/// - **逻辑（How）**：
///   - 空闲实例按 LIFO 复用（`VecDeque` 尾部进出，头部最旧），最近归还的实例最先借出；
///   - 借出时若无空闲且总量（借出 + 空闲 + 创建中）未达 `max_size`，在锁外创建新实例；
///   - 资源耗尽时依据 `block_when_exhausted` 与 `max_wait` 立即失败或在条件变量上等待；
///   - 归还时超出 `max_idle` 的实例或池已关闭时归还的实例被销毁；
///   - 配置了驱逐间隔时，后台线程仅持有 `Weak` 引用，池被丢弃后自动退出；
/// - **契约（What）**：
///   - 不属于本池的实例归还时被忽略；
///   - `close()` 后借出返回 [`InvocationError::PoolClosed`]，等待者同样被唤醒并收到该错误；
///   - 销毁失败仅记录告警，不影响其他实例；
/// - **风险（Trade-offs）**：实例身份以 `Arc` 指针判定，因此工厂必须为原型，构造时即校验。
#[derive(Clone)]
pub struct PooledTargetSource {
    inner: Arc<PoolInner>,
}

impl PooledTargetSource {
    pub fn new(factory: Arc<dyn TargetFactory>, config: PoolConfig) -> Result<Self, ConfigError> {
        require_prototype(factory.as_ref(), STRATEGY)?;
        config.validate()?;
        let interval = config.time_between_eviction_runs_ms.map(Duration::from_millis);
        let inner = Arc::new(PoolInner {
            factory,
            config,
            state: Mutex::new(PoolState::default()),
            available: Condvar::new(),
            metrics: PoolMetrics::default(),
        });
        if let Some(interval) = interval {
            spawn_evictor(Arc::downgrade(&inner), interval);
        }
        Ok(Self { inner })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// 销毁空闲过久的实例（保留 `min_idle` 个），然后补足到 `min_idle`，返回销毁数量。
    pub fn evict(&self) -> usize {
        self.inner.evict()
    }

    /// 关闭池：销毁空闲实例并唤醒所有等待者。重复调用无副作用。
    pub fn close(&self) {
        self.inner.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// 以引入形式暴露 [`PoolingStats`]。
    pub fn stats_introduction(&self) -> IntroductionAdvisor {
        IntroductionAdvisor::new(Arc::new(PoolingStatsDelegate(self.clone())))
    }
}

impl TargetSource for PooledTargetSource {
    fn target_type(&self) -> Option<TypeDescriptor> {
        Some(self.inner.factory.target_type())
    }

    fn is_static(&self) -> bool {
        false
    }

    fn get_target(&self) -> Result<Option<TargetRef>, InvocationError> {
        self.inner.borrow().map(Some)
    }

    fn release_target(&self, target: TargetRef) {
        self.inner.give_back(target);
    }
}

impl PoolingStats for PooledTargetSource {
    fn max_size(&self) -> usize {
        self.inner.config.max_size
    }

    fn active_count(&self) -> usize {
        self.inner.state.lock().active.len()
    }

    fn idle_count(&self) -> usize {
        self.inner.state.lock().idle.len()
    }

    fn borrow_count(&self) -> u64 {
        self.inner.metrics.borrowed.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for PooledTargetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("PooledTargetSource")
            .field("max_size", &self.inner.config.max_size)
            .field("active", &state.active.len())
            .field("idle", &state.idle.len())
            .field("closed", &state.closed)
            .field("created", &self.inner.metrics.created.load(Ordering::Relaxed))
            .field("destroyed", &self.inner.metrics.destroyed.load(Ordering::Relaxed))
            .field("exhausted", &self.inner.metrics.exhausted.load(Ordering::Relaxed))
            .finish()
    }
}

#[derive(Default)]
struct PoolState {
    idle: VecDeque<(TargetRef, Instant)>,
    active: HashSet<usize>,
    creating: usize,
    closed: bool,
}

impl PoolState {
    fn total(&self) -> usize {
        self.active.len() + self.idle.len() + self.creating
    }
}

#[derive(Default)]
struct PoolMetrics {
    borrowed: AtomicU64,
    created: AtomicU64,
    destroyed: AtomicU64,
    exhausted: AtomicU64,
}

struct PoolInner {
    factory: Arc<dyn TargetFactory>,
    config: PoolConfig,
    state: Mutex<PoolState>,
    available: Condvar,
    metrics: PoolMetrics,
}

impl PoolInner {
    fn borrow(&self) -> Result<TargetRef, InvocationError> {
        let started = Instant::now();
        let deadline = match self.config.max_wait {
            MaxWait::Indefinite => None,
            MaxWait::Millis(ms) => Some(started + Duration::from_millis(ms)),
        };
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(InvocationError::PoolClosed);
            }
            if let Some((target, _)) = state.idle.pop_back() {
                return Ok(self.lend(&mut state, target));
            }
            if state.total() < self.config.max_size {
                let target = self.create_unlocked(&mut state)?;
                if state.closed {
                    drop(state);
                    self.destroy(target);
                    return Err(InvocationError::PoolClosed);
                }
                return Ok(self.lend(&mut state, target));
            }
            if !self.config.block_when_exhausted {
                return Err(self.exhausted(Duration::ZERO));
            }
            match deadline {
                None => self.available.wait(&mut state),
                Some(deadline) => {
                    if self.available.wait_until(&mut state, deadline).timed_out() {
                        return Err(self.exhausted(started.elapsed()));
                    }
                }
            }
        }
    }

    fn lend(&self, state: &mut PoolState, target: TargetRef) -> TargetRef {
        state.active.insert(identity(&target));
        self.metrics.borrowed.fetch_add(1, Ordering::Relaxed);
        target
    }

    /// 占用一个创建名额，在锁外调用工厂。失败时释放名额并唤醒一个等待者。
    fn create_unlocked(
        &self,
        state: &mut MutexGuard<'_, PoolState>,
    ) -> Result<TargetRef, InvocationError> {
        state.creating += 1;
        let created = MutexGuard::unlocked(state, || create_target(self.factory.as_ref()));
        state.creating -= 1;
        match created {
            Ok(target) => {
                self.metrics.created.fetch_add(1, Ordering::Relaxed);
                Ok(target)
            }
            Err(error) => {
                self.available.notify_one();
                Err(error)
            }
        }
    }

    fn exhausted(&self, waited: Duration) -> InvocationError {
        self.metrics.exhausted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            target: targets::TARGET,
            strategy = STRATEGY,
            waited_ms = waited.as_millis() as u64,
            "pool exhausted"
        );
        InvocationError::PoolExhausted { waited }
    }

    fn give_back(&self, target: TargetRef) {
        let mut state = self.state.lock();
        if !state.active.remove(&identity(&target)) {
            tracing::debug!(
                target: targets::TARGET,
                strategy = STRATEGY,
                "ignoring release of an instance this pool did not lend"
            );
            return;
        }
        let surplus = if state.closed || state.idle.len() >= self.config.max_idle {
            Some(target)
        } else {
            state.idle.push_back((target, Instant::now()));
            None
        };
        self.available.notify_one();
        drop(state);
        if let Some(target) = surplus {
            self.destroy(target);
        }
    }

    fn evict(&self) -> usize {
        let threshold = Duration::from_millis(self.config.min_evictable_idle_ms);
        let now = Instant::now();
        let mut doomed = Vec::new();
        {
            let mut state = self.state.lock();
            if state.closed {
                return 0;
            }
            while state.idle.len() > self.config.min_idle {
                match state.idle.front() {
                    Some((_, since)) if now.saturating_duration_since(*since) >= threshold => {
                        if let Some((target, _)) = state.idle.pop_front() {
                            doomed.push(target);
                        }
                    }
                    _ => break,
                }
            }
        }
        let evicted = doomed.len();
        for target in doomed {
            self.destroy(target);
        }
        self.ensure_min_idle();
        if evicted > 0 {
            tracing::debug!(target: targets::TARGET, strategy = STRATEGY, evicted, "evicted idle targets");
        }
        evicted
    }

    fn ensure_min_idle(&self) {
        let mut state = self.state.lock();
        while !state.closed
            && state.idle.len() < self.config.min_idle
            && state.total() < self.config.max_size
        {
            match self.create_unlocked(&mut state) {
                Ok(target) if state.closed => {
                    drop(state);
                    self.destroy(target);
                    return;
                }
                Ok(target) => {
                    state.idle.push_back((target, Instant::now()));
                    self.available.notify_one();
                }
                Err(error) => {
                    tracing::warn!(
                        target: targets::TARGET,
                        strategy = STRATEGY,
                        error = %error,
                        "failed to refill pool to min_idle"
                    );
                    return;
                }
            }
        }
    }

    fn close(&self) {
        let idle: Vec<TargetRef> = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            self.available.notify_all();
            state.idle.drain(..).map(|(target, _)| target).collect()
        };
        tracing::info!(
            target: targets::TARGET,
            strategy = STRATEGY,
            destroyed = idle.len(),
            "pool closed"
        );
        for target in idle {
            self.destroy(target);
        }
    }

    fn destroy(&self, target: TargetRef) {
        self.metrics.destroyed.fetch_add(1, Ordering::Relaxed);
        destroy_target(self.factory.as_ref(), target, STRATEGY);
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        let idle = std::mem::take(&mut self.state.get_mut().idle);
        for (target, _) in idle {
            destroy_target(self.factory.as_ref(), target, STRATEGY);
        }
    }
}

fn spawn_evictor(pool: Weak<PoolInner>, interval: Duration) {
    let spawned = thread::Builder::new()
        .name("spark-aop-pool-evictor".to_owned())
        .spawn(move || {
            loop {
                thread::sleep(interval);
                let Some(pool) = pool.upgrade() else {
                    break;
                };
                if pool.state.lock().closed {
                    break;
                }
                pool.evict();
            }
        });
    if let Err(error) = spawned {
        tracing::warn!(
            target: targets::TARGET,
            strategy = STRATEGY,
            error = %error,
            "failed to start pool evictor; idle instances will only be evicted on demand"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::descriptor::MethodDescriptor;
    use crate::error::BoxError;
    use crate::target::{FnTargetFactory, Target};
    use crate::value::Value;

    struct Worker;

    impl Target for Worker {
        fn invoke(&self, _: &MethodDescriptor, _: &[Value]) -> Result<Value, InvocationError> {
            Ok(Value::null())
        }
    }

    fn pool(config: PoolConfig) -> (PooledTargetSource, Arc<AtomicUsize>) {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let factory = FnTargetFactory::new(TypeDescriptor::new("Worker"), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<TargetRef, BoxError>(Arc::new(Worker))
        });
        (PooledTargetSource::new(Arc::new(factory), config).unwrap(), created)
    }

    fn fail_fast(max_size: usize) -> PoolConfig {
        PoolConfig {
            max_size,
            block_when_exhausted: false,
            ..PoolConfig::default()
        }
    }

    #[test]
    fn idle_instances_are_reused_lifo() {
        let (pool, created) = pool(fail_fast(2));
        let a = pool.get_target().unwrap().unwrap();
        let b = pool.get_target().unwrap().unwrap();
        pool.release_target(Arc::clone(&a));
        pool.release_target(Arc::clone(&b));

        let again = pool.get_target().unwrap().unwrap();
        assert!(Arc::ptr_eq(&again, &b));
        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert_eq!(pool.borrow_count(), 3);
        assert_eq!((pool.active_count(), pool.idle_count()), (1, 1));
    }

    #[test]
    fn fail_fast_pool_reports_exhaustion() {
        let (pool, _) = pool(fail_fast(1));
        let _held = pool.get_target().unwrap();
        let err = pool.get_target().err().expect("second borrow must fail");
        assert_eq!(err.code(), "aop.pool.exhausted");
    }

    #[test]
    fn bounded_wait_times_out() {
        let (pool, _) = pool(PoolConfig {
            max_size: 1,
            max_wait: MaxWait::Millis(20),
            ..PoolConfig::default()
        });
        let _held = pool.get_target().unwrap();
        match pool.get_target() {
            Err(InvocationError::PoolExhausted { waited }) => {
                assert!(waited >= Duration::from_millis(20));
            }
            Err(other) => panic!("expected exhaustion, got {other:?}"),
            Ok(_) => panic!("expected exhaustion, got a target"),
        }
    }

    #[test]
    fn foreign_instances_are_ignored_on_release() {
        let (pool, _) = pool(fail_fast(1));
        pool.release_target(Arc::new(Worker));
        assert_eq!((pool.active_count(), pool.idle_count()), (0, 0));
    }

    #[test]
    fn surplus_idle_instances_are_destroyed() {
        let (pool, _) = pool(PoolConfig {
            max_size: 3,
            max_idle: 1,
            ..fail_fast(3)
        });
        let held: Vec<TargetRef> = (0..3).map(|_| pool.get_target().unwrap().unwrap()).collect();
        for target in held {
            pool.release_target(target);
        }
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.inner.metrics.destroyed.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn eviction_keeps_min_idle_and_refills() {
        let (pool, created) = pool(PoolConfig {
            max_size: 4,
            min_idle: 2,
            min_evictable_idle_ms: 0,
            ..fail_fast(4)
        });
        assert_eq!(pool.evict(), 0);
        assert_eq!(pool.idle_count(), 2);
        assert_eq!(created.load(Ordering::SeqCst), 2);

        let held: Vec<TargetRef> = (0..4).map(|_| pool.get_target().unwrap().unwrap()).collect();
        for target in held {
            pool.release_target(target);
        }
        assert_eq!(pool.idle_count(), 4);
        assert_eq!(pool.evict(), 2);
        assert_eq!(pool.idle_count(), 2);
    }

    #[test]
    fn closing_wakes_waiters_and_rejects_borrowers() {
        let (pool, _) = pool(PoolConfig {
            max_size: 1,
            ..PoolConfig::default()
        });
        let held = pool.get_target().unwrap().unwrap();
        let waiter = {
            let pool = pool.clone();
            thread::spawn(move || pool.get_target().map(|t| t.is_some()))
        };
        thread::sleep(Duration::from_millis(20));
        pool.close();
        let outcome = waiter.join().unwrap();
        assert!(matches!(outcome, Err(InvocationError::PoolClosed)));

        pool.release_target(held);
        assert_eq!(pool.idle_count(), 0);
        assert!(matches!(pool.get_target(), Err(InvocationError::PoolClosed)));
    }

    #[test]
    fn non_prototype_factories_are_rejected() {
        let factory = FnTargetFactory::new(TypeDescriptor::new("Worker"), || {
            Ok::<TargetRef, BoxError>(Arc::new(Worker))
        })
        .shared();
        let err = PooledTargetSource::new(Arc::new(factory), PoolConfig::default()).unwrap_err();
        assert_eq!(err.code(), "aop.config.not_prototype");
    }
}
