//! 通知器注册表：声明顺序列表 + 排序快照 + epoch。
//!
//! # 设计背景（Why）
//! - 调用路径只需读取排序后的通知器，读取必须无锁；变更频率低，可以在互斥锁下整体重建快照；
//! - 每次变更递增 epoch，链缓存据此判定缓存项是否过期；
//! - 注册表同时持有一份按 (目标类型, 方法) 的链缓存，共享注册表的代理据此复用已构建的链。
//!
//! # 契约说明（What）
//! - [`AdvisorRegistry::snapshot`] 返回的快照是不可变值，调用方可长期持有；
//! - 快照总是对声明列表重新排序得到，排序规则见 [`crate::precedence`]。

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::advisor::{Advisor, AdvisorBody};
use crate::chain::ChainCache;
use crate::error::ConfigError;
use crate::observability::targets;
use crate::precedence::sort_advisors;

/// 可在多个代理间共享的通知器注册表。
///
/// # 教案式说明
/// - **逻辑（How）**：`declared` 保存声明顺序，由互斥锁串行化变更；变更后调用 [`sort_advisors`]
///   生成新快照，经 `ArcSwap` 原子替换，再递增 epoch；
/// - **契约（What）**：epoch 单调递增，初始为 0；注册引入通知器时先校验委托是否实现了承诺的接口；
/// - **风险（Trade-offs）**：先替换快照再递增 epoch，读者可能以旧 epoch 缓存新快照构建的链，
///   下一次读取时会被判定过期并重建，结果仍然正确。
pub struct AdvisorRegistry {
    declared: Mutex<Vec<Advisor>>,
    sorted: ArcSwap<Vec<Advisor>>,
    epoch: AtomicU64,
    chains: ChainCache,
}

impl AdvisorRegistry {
    pub fn new() -> Self {
        Self {
            declared: Mutex::new(Vec::new()),
            sorted: ArcSwap::from_pointee(Vec::new()),
            epoch: AtomicU64::new(0),
            chains: ChainCache::default(),
        }
    }

    /// 以一组通知器初始化注册表。
    pub fn with_advisors<I>(advisors: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = Advisor>,
    {
        let registry = Self::new();
        for advisor in advisors {
            registry.register_advisor(advisor)?;
        }
        Ok(registry)
    }

    /// 追加通知器，返回新的 epoch。
    pub fn register_advisor(&self, advisor: Advisor) -> Result<u64, ConfigError> {
        if let AdvisorBody::Introduction(introduction) = advisor.body() {
            introduction.validate_interfaces(advisor.name())?;
        }
        let mut declared = self.declared.lock();
        tracing::debug!(
            target: targets::REGISTRY,
            advisor = advisor.name(),
            order = advisor.precedence().order(),
            "registering advisor"
        );
        declared.push(advisor);
        Ok(self.publish(&declared))
    }

    /// 按名称移除首个匹配的通知器；不存在时返回 `None`。
    pub fn remove_advisor(&self, name: &str) -> Option<Advisor> {
        let mut declared = self.declared.lock();
        let position = declared.iter().position(|a| a.name() == name)?;
        let removed = declared.remove(position);
        tracing::debug!(target: targets::REGISTRY, advisor = name, "removed advisor");
        self.publish(&declared);
        Some(removed)
    }

    /// 当前排序后的通知器快照。
    pub fn snapshot(&self) -> Arc<Vec<Advisor>> {
        self.sorted.load_full()
    }

    /// 按声明顺序返回通知器副本。
    pub fn declared(&self) -> Vec<Advisor> {
        self.declared.lock().clone()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.sorted.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.load().is_empty()
    }

    /// 供只使用内置通知的代理共享的链缓存。
    pub(crate) fn shared_chains(&self) -> &ChainCache {
        &self.chains
    }

    fn publish(&self, declared: &[Advisor]) -> u64 {
        self.sorted.store(Arc::new(sort_advisors(declared)));
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Default for AdvisorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AdvisorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .snapshot()
            .iter()
            .map(|a| a.name().to_owned())
            .collect();
        f.debug_struct("AdvisorRegistry")
            .field("advisors", &names)
            .field("epoch", &self.epoch())
            .field("cached_chains", &self.chains.len())
            .finish()
    }
}
