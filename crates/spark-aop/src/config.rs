//! 配置：池参数与代理行为开关，支持从 TOML 加载。
//!
//! # 设计背景（Why）
//! - 池的容量、等待与驱逐策略通常来自部署配置而非代码，因此以 `serde` 结构体承载，
//!   缺省字段取默认值，未知字段直接报错，避免拼写错误被静默忽略；
//! - 池等待上限以显式的 [`MaxWait::Indefinite`] 表达“无限等待”，不使用负数或零之类的哨兵值。
//!
//! # 契约说明（What）
//! - `from_toml_str` 解析后立即执行 `validate()`，两类错误都以 [`ConfigError`] 返回；
//! - TOML 中 `max_wait = "indefinite"` 或 `max_wait = { millis = 250 }`。

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 借出等待上限。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxWait {
    /// 一直等待，直到有实例归还或池关闭。
    #[default]
    Indefinite,
    /// 最多等待的毫秒数。
    Millis(u64),
}

/// 池化目标源配置。
///
/// # 教案式说明
/// - **契约（What）**：
///   - `max_size` 至少为 1，是借出、空闲与创建中实例的总量上限；
///   - `max_idle` 为归还后保留的空闲实例上限，超出部分立即销毁；
///   - `min_idle` 不得超过 `max_idle` 与 `max_size`，仅在驱逐时补足；
///   - `time_between_eviction_runs_ms` 为空时不启动后台驱逐线程。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    pub max_size: usize,
    pub max_idle: usize,
    pub min_idle: usize,
    pub block_when_exhausted: bool,
    pub max_wait: MaxWait,
    pub time_between_eviction_runs_ms: Option<u64>,
    pub min_evictable_idle_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 8,
            max_idle: 8,
            min_idle: 0,
            block_when_exhausted: true,
            max_wait: MaxWait::Indefinite,
            time_between_eviction_runs_ms: None,
            min_evictable_idle_ms: 30 * 60 * 1000,
        }
    }
}

impl PoolConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: PoolConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let reason = if self.max_size == 0 {
            Some("max_size must be at least 1".to_owned())
        } else if self.min_idle > self.max_idle {
            Some(format!(
                "min_idle ({}) exceeds max_idle ({})",
                self.min_idle, self.max_idle
            ))
        } else if self.min_idle > self.max_size {
            Some(format!(
                "min_idle ({}) exceeds max_size ({})",
                self.min_idle, self.max_size
            ))
        } else if self.time_between_eviction_runs_ms == Some(0) {
            Some("time_between_eviction_runs_ms must be positive when set".to_owned())
        } else {
            None
        };
        match reason {
            Some(reason) => Err(ConfigError::InvalidPool { reason }),
            None => Ok(()),
        }
    }
}

/// 代理行为开关。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProxySettings {
    /// 冻结后禁止在运行中增删通知器。
    pub frozen: bool,
    /// 调用期间通过 [`crate::context::current_proxy`] 暴露当前代理。
    pub expose_proxy: bool,
    /// 按方法缓存拦截链；关闭后每次调用都重新构建。
    pub cache_chains: bool,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            frozen: false,
            expose_proxy: false,
            cache_chains: true,
        }
    }
}

impl ProxySettings {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}
