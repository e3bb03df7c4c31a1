use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::descriptor::{MethodDescriptor, TypeDescriptor};
use crate::value::Arguments;

use super::class_filter::ClassFilter;
use super::pattern::simple_match;

/// 用户自定义的方法谓词。
///
/// # 教案式说明
/// - **契约（What）**：
///   - `matches` 为静态阶段，对非运行期谓词可按 (方法, 类型) 缓存；
///   - `is_runtime` 返回 `true` 时，静态阶段通过后每次调用还会以实际参数调用 `matches_args`；
///   - `matches_with_introductions` 默认等同静态阶段，实现方可在已知存在引入时走捷径。
pub trait MethodPredicate: Send + Sync + 'static {
    fn matches(&self, method: &MethodDescriptor, target_type: &TypeDescriptor) -> bool;

    fn is_runtime(&self) -> bool {
        false
    }

    fn matches_args(
        &self,
        _method: &MethodDescriptor,
        _target_type: &TypeDescriptor,
        _args: &Arguments,
    ) -> bool {
        true
    }

    fn matches_with_introductions(
        &self,
        method: &MethodDescriptor,
        target_type: &TypeDescriptor,
        _has_introductions: bool,
    ) -> bool {
        self.matches(method, target_type)
    }
}

struct FnMethodPredicate<F>(F);

impl<F> MethodPredicate for FnMethodPredicate<F>
where
    F: Fn(&MethodDescriptor, &TypeDescriptor) -> bool + Send + Sync + 'static,
{
    fn matches(&self, method: &MethodDescriptor, target_type: &TypeDescriptor) -> bool {
        (self.0)(method, target_type)
    }
}

struct DynamicFnPredicate<S, D> {
    static_part: S,
    dynamic_part: D,
}

impl<S, D> MethodPredicate for DynamicFnPredicate<S, D>
where
    S: Fn(&MethodDescriptor, &TypeDescriptor) -> bool + Send + Sync + 'static,
    D: Fn(&MethodDescriptor, &TypeDescriptor, &Arguments) -> bool + Send + Sync + 'static,
{
    fn matches(&self, method: &MethodDescriptor, target_type: &TypeDescriptor) -> bool {
        (self.static_part)(method, target_type)
    }

    fn is_runtime(&self) -> bool {
        true
    }

    fn matches_args(
        &self,
        method: &MethodDescriptor,
        target_type: &TypeDescriptor,
        args: &Arguments,
    ) -> bool {
        (self.dynamic_part)(method, target_type, args)
    }
}

/// 方法级匹配器，支持静态与运行期两阶段判定。
///
/// # 教案式说明
/// - **意图（Why）**：绝大多数匹配只依赖方法身份，可在链构建时一次算清；少数需要观察实参的匹配
///   延迟到调用期，且必须看到前序拦截器对参数的修改；
/// - **契约（What）**：
///   - 调用方先执行 [`MethodMatcher::matches`]，仅当其通过且 [`MethodMatcher::is_runtime`] 为真时
///     才调用 [`MethodMatcher::matches_args`]；
///   - 组合匹配器绝不对其中的非运行期部分调用动态阶段；
///   - 并集：静态取任一，运行期标志取任一，动态阶段取“静态通过且（非运行期或动态通过）”的任一部分；
///   - 交集：静态取全部，运行期标志取任一，动态阶段要求所有运行期部分的动态阶段通过；
///   - 取反：内层为静态时直接取反；内层为运行期时静态阶段放行，动态阶段为
///     `!(内层静态 && 内层动态)`；
///   - [`MethodMatcher::ClassScoped`] 先以类型过滤器限定，再委托内层匹配器；
///   - 相等性与哈希按值计算，[`MethodMatcher::Custom`] 按实例身份比较。
#[derive(Clone)]
pub enum MethodMatcher {
    True,
    /// 方法名满足任一简单通配模式。
    Names(Arc<[Arc<str>]>),
    /// 与给定方法描述完全一致。
    Signature(MethodDescriptor),
    /// 方法的声明类型名相等。
    DeclaredBy(Arc<str>),
    ClassScoped(ClassFilter, Arc<MethodMatcher>),
    Union(Arc<[MethodMatcher]>),
    Intersection(Arc<[MethodMatcher]>),
    Negate(Arc<MethodMatcher>),
    Custom(Arc<dyn MethodPredicate>),
}

impl MethodMatcher {
    pub fn names<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        MethodMatcher::Names(patterns.into_iter().map(Into::into).collect())
    }

    pub fn signature(method: MethodDescriptor) -> Self {
        MethodMatcher::Signature(method)
    }

    pub fn declared_by(type_name: impl Into<Arc<str>>) -> Self {
        MethodMatcher::DeclaredBy(type_name.into())
    }

    /// 以闭包构造静态匹配器。
    pub fn from_fn<F>(predicate: F) -> Self
    where
        F: Fn(&MethodDescriptor, &TypeDescriptor) -> bool + Send + Sync + 'static,
    {
        MethodMatcher::Custom(Arc::new(FnMethodPredicate(predicate)))
    }

    /// 以两个闭包构造运行期匹配器：`static_part` 决定是否进入链，`dynamic_part` 每次调用时判定。
    pub fn dynamic<S, D>(static_part: S, dynamic_part: D) -> Self
    where
        S: Fn(&MethodDescriptor, &TypeDescriptor) -> bool + Send + Sync + 'static,
        D: Fn(&MethodDescriptor, &TypeDescriptor, &Arguments) -> bool + Send + Sync + 'static,
    {
        MethodMatcher::Custom(Arc::new(DynamicFnPredicate {
            static_part,
            dynamic_part,
        }))
    }

    pub fn custom(predicate: Arc<dyn MethodPredicate>) -> Self {
        MethodMatcher::Custom(predicate)
    }

    /// 以类型过滤器限定匹配范围；过滤器为 `True` 时原样返回。
    pub fn class_scoped(class_filter: ClassFilter, matcher: MethodMatcher) -> Self {
        match class_filter {
            ClassFilter::True => matcher,
            filter => MethodMatcher::ClassScoped(filter, Arc::new(matcher)),
        }
    }

    pub fn or(self, other: MethodMatcher) -> MethodMatcher {
        if matches!(self, MethodMatcher::True) || matches!(other, MethodMatcher::True) {
            return MethodMatcher::True;
        }
        let mut parts = Vec::new();
        for matcher in [self, other] {
            match matcher {
                MethodMatcher::Union(inner) => parts.extend(inner.iter().cloned()),
                other => parts.push(other),
            }
        }
        MethodMatcher::Union(Arc::from(parts))
    }

    pub fn and(self, other: MethodMatcher) -> MethodMatcher {
        match (self, other) {
            (MethodMatcher::True, other) | (other, MethodMatcher::True) => other,
            (left, right) => {
                let mut parts = Vec::new();
                for matcher in [left, right] {
                    match matcher {
                        MethodMatcher::Intersection(inner) => parts.extend(inner.iter().cloned()),
                        other => parts.push(other),
                    }
                }
                MethodMatcher::Intersection(Arc::from(parts))
            }
        }
    }

    pub fn negate(self) -> MethodMatcher {
        match self {
            MethodMatcher::Negate(inner) => (*inner).clone(),
            other => MethodMatcher::Negate(Arc::new(other)),
        }
    }

    /// 静态阶段。
    pub fn matches(&self, method: &MethodDescriptor, target_type: &TypeDescriptor) -> bool {
        match self {
            MethodMatcher::True => true,
            MethodMatcher::Names(patterns) => {
                patterns.iter().any(|p| simple_match(p, method.name()))
            }
            MethodMatcher::Signature(expected) => expected == method,
            MethodMatcher::DeclaredBy(type_name) => method.declaring_type() == &**type_name,
            MethodMatcher::ClassScoped(filter, inner) => {
                filter.matches(target_type) && inner.matches(method, target_type)
            }
            MethodMatcher::Union(parts) => parts.iter().any(|m| m.matches(method, target_type)),
            MethodMatcher::Intersection(parts) => {
                parts.iter().all(|m| m.matches(method, target_type))
            }
            MethodMatcher::Negate(inner) => {
                inner.is_runtime() || !inner.matches(method, target_type)
            }
            MethodMatcher::Custom(predicate) => predicate.matches(method, target_type),
        }
    }

    pub fn is_runtime(&self) -> bool {
        match self {
            MethodMatcher::True
            | MethodMatcher::Names(_)
            | MethodMatcher::Signature(_)
            | MethodMatcher::DeclaredBy(_) => false,
            MethodMatcher::ClassScoped(_, inner) | MethodMatcher::Negate(inner) => {
                inner.is_runtime()
            }
            MethodMatcher::Union(parts) | MethodMatcher::Intersection(parts) => {
                parts.iter().any(MethodMatcher::is_runtime)
            }
            MethodMatcher::Custom(predicate) => predicate.is_runtime(),
        }
    }

    /// 动态阶段；调用前静态阶段必须已经通过。非运行期匹配器恒为 `true`。
    pub fn matches_args(
        &self,
        method: &MethodDescriptor,
        target_type: &TypeDescriptor,
        args: &Arguments,
    ) -> bool {
        if !self.is_runtime() {
            return true;
        }
        match self {
            MethodMatcher::ClassScoped(_, inner) => inner.matches_args(method, target_type, args),
            MethodMatcher::Union(parts) => parts.iter().any(|part| {
                part.matches(method, target_type)
                    && (!part.is_runtime() || part.matches_args(method, target_type, args))
            }),
            MethodMatcher::Intersection(parts) => parts
                .iter()
                .filter(|part| part.is_runtime())
                .all(|part| part.matches_args(method, target_type, args)),
            MethodMatcher::Negate(inner) => {
                !(inner.matches(method, target_type)
                    && inner.matches_args(method, target_type, args))
            }
            MethodMatcher::Custom(predicate) => predicate.matches_args(method, target_type, args),
            MethodMatcher::True
            | MethodMatcher::Names(_)
            | MethodMatcher::Signature(_)
            | MethodMatcher::DeclaredBy(_) => true,
        }
    }

    /// 引入感知的静态阶段；未自定义时与 [`MethodMatcher::matches`] 相同。
    pub fn matches_with_introductions(
        &self,
        method: &MethodDescriptor,
        target_type: &TypeDescriptor,
        has_introductions: bool,
    ) -> bool {
        match self {
            MethodMatcher::ClassScoped(filter, inner) => {
                filter.matches(target_type)
                    && inner.matches_with_introductions(method, target_type, has_introductions)
            }
            MethodMatcher::Union(parts) => parts
                .iter()
                .any(|m| m.matches_with_introductions(method, target_type, has_introductions)),
            MethodMatcher::Intersection(parts) => parts
                .iter()
                .all(|m| m.matches_with_introductions(method, target_type, has_introductions)),
            MethodMatcher::Negate(inner) => {
                inner.is_runtime()
                    || !inner.matches_with_introductions(method, target_type, has_introductions)
            }
            MethodMatcher::Custom(predicate) => {
                predicate.matches_with_introductions(method, target_type, has_introductions)
            }
            other => other.matches(method, target_type),
        }
    }
}

impl PartialEq for MethodMatcher {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (MethodMatcher::True, MethodMatcher::True) => true,
            (MethodMatcher::Names(a), MethodMatcher::Names(b)) => a == b,
            (MethodMatcher::Signature(a), MethodMatcher::Signature(b)) => a == b,
            (MethodMatcher::DeclaredBy(a), MethodMatcher::DeclaredBy(b)) => a == b,
            (MethodMatcher::ClassScoped(fa, ma), MethodMatcher::ClassScoped(fb, mb)) => {
                fa == fb && ma == mb
            }
            (MethodMatcher::Union(a), MethodMatcher::Union(b))
            | (MethodMatcher::Intersection(a), MethodMatcher::Intersection(b)) => a == b,
            (MethodMatcher::Negate(a), MethodMatcher::Negate(b)) => a == b,
            (MethodMatcher::Custom(a), MethodMatcher::Custom(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }
}

impl Eq for MethodMatcher {}

impl Hash for MethodMatcher {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            MethodMatcher::True => {}
            MethodMatcher::Names(patterns) => patterns.hash(state),
            MethodMatcher::Signature(method) => method.hash(state),
            MethodMatcher::DeclaredBy(type_name) => type_name.hash(state),
            MethodMatcher::ClassScoped(filter, inner) => {
                filter.hash(state);
                inner.hash(state);
            }
            MethodMatcher::Union(parts) | MethodMatcher::Intersection(parts) => parts.hash(state),
            MethodMatcher::Negate(inner) => inner.hash(state),
            MethodMatcher::Custom(predicate) => {
                (Arc::as_ptr(predicate) as *const () as usize).hash(state)
            }
        }
    }
}

impl fmt::Debug for MethodMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodMatcher::True => f.write_str("MethodMatcher::True"),
            MethodMatcher::Names(patterns) => f.debug_tuple("Names").field(patterns).finish(),
            MethodMatcher::Signature(method) => write!(f, "Signature({method})"),
            MethodMatcher::DeclaredBy(type_name) => write!(f, "DeclaredBy({type_name})"),
            MethodMatcher::ClassScoped(filter, inner) => f
                .debug_tuple("ClassScoped")
                .field(filter)
                .field(inner)
                .finish(),
            MethodMatcher::Union(parts) => f.debug_tuple("Union").field(parts).finish(),
            MethodMatcher::Intersection(parts) => {
                f.debug_tuple("Intersection").field(parts).finish()
            }
            MethodMatcher::Negate(inner) => f.debug_tuple("Negate").field(inner).finish(),
            MethodMatcher::Custom(predicate) => {
                write!(f, "Custom(runtime={})", predicate.is_runtime())
            }
        }
    }
}
