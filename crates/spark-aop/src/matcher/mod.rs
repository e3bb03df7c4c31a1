//! 两阶段匹配模型：类型过滤器 + 方法匹配器 → 切点。
//!
//! # 设计背景（Why）
//! - 匹配分为静态阶段（仅依赖方法与目标类型，可随链缓存）与动态阶段（依赖实参，每次调用重算）；
//! - 匹配器会参与链缓存键与注册表比较，因此内置变体与组合变体都提供值语义的相等性和哈希。
//!
//! # 契约说明（What）
//! - 生效条件：`cf(type) && mm(method, type) && (!mm.is_runtime() || mm.matches_args(..))`；
//! - 自定义谓词通过 [`ClassPredicate`] / [`MethodPredicate`] 接入，按实例身份比较。

mod class_filter;
mod method_matcher;
mod pattern;
mod pointcut;

pub use class_filter::{ClassFilter, ClassPredicate};
pub use method_matcher::{MethodMatcher, MethodPredicate};
pub use pattern::simple_match;
pub use pointcut::Pointcut;
