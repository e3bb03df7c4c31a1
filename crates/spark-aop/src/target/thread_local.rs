use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::descriptor::TypeDescriptor;
use crate::error::{ConfigError, InvocationError};
use crate::introduction::IntroductionAdvisor;
use crate::observability::targets;

use super::stats::{ThreadLocalStats, ThreadLocalStatsDelegate};
use super::{
    Target, TargetFactory, TargetRef, TargetSource, create_target, destroy_target,
    require_prototype,
};

const STRATEGY: &str = "thread_local";

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// 当前线程已绑定的实例：源 id → (绑定时的代数, 实例的弱引用)。强引用只由源持有。
    static BOUND: RefCell<HashMap<u64, (u64, Weak<dyn Target>)>> = RefCell::new(HashMap::new());
}

/// 每个线程一个实例的目标源。
///
/// # 教案式说明
/// - **意图（Why）**：目标对象非线程安全但可按线程复用时，避免池化的锁竞争；
/// - **逻辑（How）**：
///   - 快路径只读线程本地映射，不取任何锁；
///   - 首次在某线程使用时创建实例，在互斥锁下登记到“全部实例”列表，并以当时的代数绑定到线程；
///   - 线程本地映射只保存弱引用，实例的生命周期完全由“全部实例”列表决定；
///   - `destroy()` 在同一把锁下递增代数并取走全部实例，随后逐个销毁；代数不符的线程绑定会被视为
///     失效并移除，因此销毁前绑定的实例不会再被交出；
/// - **契约（What）**：每个实例恰好销毁一次，单个实例销毁失败只记录告警；源被销毁或丢弃后，
///   线程本地映射不再让实例存活；
/// - **风险（Trade-offs）**：已丢弃源留下的失效条目在该线程下一次绑定新实例时才被清理，
///   每条只占一个弱引用。
#[derive(Clone)]
pub struct ThreadLocalTargetSource {
    inner: Arc<ThreadLocalInner>,
}

struct ThreadLocalInner {
    id: u64,
    factory: Arc<dyn TargetFactory>,
    generation: AtomicU64,
    all: Mutex<Vec<TargetRef>>,
    invocations: AtomicU64,
    hits: AtomicU64,
}

impl ThreadLocalTargetSource {
    pub fn new(factory: Arc<dyn TargetFactory>) -> Result<Self, ConfigError> {
        require_prototype(factory.as_ref(), STRATEGY)?;
        Ok(Self {
            inner: Arc::new(ThreadLocalInner {
                id: NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed),
                factory,
                generation: AtomicU64::new(0),
                all: Mutex::new(Vec::new()),
                invocations: AtomicU64::new(0),
                hits: AtomicU64::new(0),
            }),
        })
    }

    /// 销毁所有线程上创建的实例，返回销毁数量。
    pub fn destroy(&self) -> usize {
        self.inner.destroy_all()
    }

    /// 以引入形式暴露 [`ThreadLocalStats`]。
    pub fn stats_introduction(&self) -> IntroductionAdvisor {
        IntroductionAdvisor::new(Arc::new(ThreadLocalStatsDelegate(self.clone())))
    }
}

impl ThreadLocalInner {
    fn bound(&self, generation: u64) -> Option<TargetRef> {
        BOUND.with(|bound| {
            let mut bound = bound.borrow_mut();
            let (bound_generation, target) = bound.get(&self.id)?;
            let live = (*bound_generation == generation)
                .then(|| target.upgrade())
                .flatten();
            if live.is_none() {
                bound.remove(&self.id);
            }
            live
        })
    }

    /// 以 `generation` 把实例绑定到当前线程，顺带清理已失效的条目。
    fn bind(&self, generation: u64, target: &TargetRef) {
        BOUND.with(|bound| {
            let mut bound = bound.borrow_mut();
            bound.retain(|_, (_, weak)| weak.strong_count() > 0);
            bound.insert(self.id, (generation, Arc::downgrade(target)));
        });
    }

    fn destroy_all(&self) -> usize {
        let doomed = {
            let mut all = self.all.lock();
            self.generation.fetch_add(1, Ordering::AcqRel);
            std::mem::take(&mut *all)
        };
        let count = doomed.len();
        for target in doomed {
            destroy_target(self.factory.as_ref(), target, STRATEGY);
        }
        tracing::debug!(
            target: targets::TARGET,
            strategy = STRATEGY,
            destroyed = count,
            "destroyed thread-bound targets"
        );
        count
    }
}

impl Drop for ThreadLocalInner {
    fn drop(&mut self) {
        for target in std::mem::take(self.all.get_mut()) {
            destroy_target(self.factory.as_ref(), target, STRATEGY);
        }
    }
}

impl TargetSource for ThreadLocalTargetSource {
    fn target_type(&self) -> Option<TypeDescriptor> {
        Some(self.inner.factory.target_type())
    }

    fn is_static(&self) -> bool {
        false
    }

    fn get_target(&self) -> Result<Option<TargetRef>, InvocationError> {
        let inner = &self.inner;
        inner.invocations.fetch_add(1, Ordering::Relaxed);
        if let Some(target) = inner.bound(inner.generation.load(Ordering::Acquire)) {
            inner.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(target));
        }

        let target = create_target(inner.factory.as_ref())?;
        let generation = {
            let mut all = inner.all.lock();
            all.push(TargetRef::clone(&target));
            inner.generation.load(Ordering::Acquire)
        };
        inner.bind(generation, &target);
        Ok(Some(target))
    }

    fn release_target(&self, _target: TargetRef) {}
}

impl ThreadLocalStats for ThreadLocalTargetSource {
    fn invocation_count(&self) -> u64 {
        self.inner.invocations.load(Ordering::Relaxed)
    }

    fn hit_count(&self) -> u64 {
        self.inner.hits.load(Ordering::Relaxed)
    }

    fn object_count(&self) -> usize {
        self.inner.all.lock().len()
    }
}

impl fmt::Debug for ThreadLocalTargetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadLocalTargetSource")
            .field("id", &self.inner.id)
            .field("generation", &self.inner.generation.load(Ordering::Relaxed))
            .field("objects", &self.object_count())
            .finish()
    }
}
