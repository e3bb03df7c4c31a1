use std::sync::Arc;

use crate::descriptor::{MethodDescriptor, TypeDescriptor};
use crate::value::Arguments;

use super::class_filter::ClassFilter;
use super::method_matcher::MethodMatcher;

/// 不可变的 (类型过滤器, 方法匹配器) 组合。
///
/// # 教案式说明
/// - **契约（What）**：
///   - [`Pointcut::TRUE`] 匹配一切连接点；
///   - [`Pointcut::union`] 会把每一侧的方法匹配器限定在各自的类型过滤器之内，保证
///     `(cf1 && mm1) || (cf2 && mm2)` 成立，而不是错误地放大为 `(cf1 || cf2) && (mm1 || mm2)`；
///   - [`Pointcut::intersection`] 对两部分分别求交。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Pointcut {
    class_filter: ClassFilter,
    method_matcher: MethodMatcher,
}

impl Pointcut {
    pub const TRUE: Pointcut = Pointcut {
        class_filter: ClassFilter::True,
        method_matcher: MethodMatcher::True,
    };

    pub fn new(class_filter: ClassFilter, method_matcher: MethodMatcher) -> Self {
        Self {
            class_filter,
            method_matcher,
        }
    }

    /// 任意类型上名称满足通配模式的方法。
    pub fn method_names<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Self::new(ClassFilter::True, MethodMatcher::names(patterns))
    }

    /// 满足类型过滤器的任意方法。
    pub fn for_class(class_filter: ClassFilter) -> Self {
        Self::new(class_filter, MethodMatcher::True)
    }

    pub fn class_filter(&self) -> &ClassFilter {
        &self.class_filter
    }

    pub fn method_matcher(&self) -> &MethodMatcher {
        &self.method_matcher
    }

    pub fn union(&self, other: &Pointcut) -> Pointcut {
        let left =
            MethodMatcher::class_scoped(self.class_filter.clone(), self.method_matcher.clone());
        let right =
            MethodMatcher::class_scoped(other.class_filter.clone(), other.method_matcher.clone());
        Pointcut {
            class_filter: self.class_filter.clone().or(other.class_filter.clone()),
            method_matcher: left.or(right),
        }
    }

    pub fn intersection(&self, other: &Pointcut) -> Pointcut {
        Pointcut {
            class_filter: self.class_filter.clone().and(other.class_filter.clone()),
            method_matcher: self.method_matcher.clone().and(other.method_matcher.clone()),
        }
    }

    /// 静态阶段：类型过滤器与方法匹配器（引入感知形式）均通过。
    pub fn matches_statically(
        &self,
        method: &MethodDescriptor,
        target_type: &TypeDescriptor,
        has_introductions: bool,
    ) -> bool {
        self.class_filter.matches(target_type)
            && self
                .method_matcher
                .matches_with_introductions(method, target_type, has_introductions)
    }

    /// 完整生效判定，包含动态阶段。
    pub fn applies(
        &self,
        method: &MethodDescriptor,
        target_type: &TypeDescriptor,
        args: &Arguments,
    ) -> bool {
        self.class_filter.matches(target_type)
            && self.method_matcher.matches(method, target_type)
            && (!self.method_matcher.is_runtime()
                || self.method_matcher.matches_args(method, target_type, args))
    }
}

impl Default for Pointcut {
    fn default() -> Self {
        Pointcut::TRUE
    }
}
