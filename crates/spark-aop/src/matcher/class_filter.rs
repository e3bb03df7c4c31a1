use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::descriptor::TypeDescriptor;

use super::pattern::simple_match;

/// 用户自定义的类型谓词。
pub trait ClassPredicate: Send + Sync + 'static {
    fn matches(&self, target_type: &TypeDescriptor) -> bool;
}

struct FnClassPredicate<F>(F);

impl<F> ClassPredicate for FnClassPredicate<F>
where
    F: Fn(&TypeDescriptor) -> bool + Send + Sync + 'static,
{
    fn matches(&self, target_type: &TypeDescriptor) -> bool {
        (self.0)(target_type)
    }
}

/// 类型级过滤器。
///
/// # 教案式说明
/// - **意图（Why）**：切点与引入都以类型过滤器限定适用范围；过滤器会作为缓存键参与比较，
///   因此必须提供值语义的相等性，组合过滤器（并、交、非）亦然；
/// - **契约（What）**：
///   - [`ClassFilter::True`] 是规范化的“全匹配”值；
///   - 内置变体按值比较与哈希，[`ClassFilter::Custom`] 按实例身份比较；
///   - 组合顺序参与比较：`a.or(b)` 与 `b.or(a)` 匹配结果相同但不相等。
#[derive(Clone)]
pub enum ClassFilter {
    /// 匹配一切类型。
    True,
    /// 目标类型自身、祖先或实现的接口中包含该名称。
    AssignableTo(Arc<str>),
    /// 目标类型名完全相等。
    Exact(Arc<str>),
    /// 目标类型名满足简单通配模式。
    NamePattern(Arc<str>),
    Union(Arc<[ClassFilter]>),
    Intersection(Arc<[ClassFilter]>),
    Negate(Arc<ClassFilter>),
    Custom(Arc<dyn ClassPredicate>),
}

impl ClassFilter {
    pub fn assignable_to(type_name: impl Into<Arc<str>>) -> Self {
        ClassFilter::AssignableTo(type_name.into())
    }

    pub fn exact(type_name: impl Into<Arc<str>>) -> Self {
        ClassFilter::Exact(type_name.into())
    }

    pub fn name_pattern(pattern: impl Into<Arc<str>>) -> Self {
        ClassFilter::NamePattern(pattern.into())
    }

    pub fn from_fn<F>(predicate: F) -> Self
    where
        F: Fn(&TypeDescriptor) -> bool + Send + Sync + 'static,
    {
        ClassFilter::Custom(Arc::new(FnClassPredicate(predicate)))
    }

    pub fn custom(predicate: Arc<dyn ClassPredicate>) -> Self {
        ClassFilter::Custom(predicate)
    }

    pub fn matches(&self, target_type: &TypeDescriptor) -> bool {
        match self {
            ClassFilter::True => true,
            ClassFilter::AssignableTo(name) => target_type.is_assignable_to(name),
            ClassFilter::Exact(name) => target_type.name() == &**name,
            ClassFilter::NamePattern(pattern) => simple_match(pattern, target_type.name()),
            ClassFilter::Union(parts) => parts.iter().any(|f| f.matches(target_type)),
            ClassFilter::Intersection(parts) => parts.iter().all(|f| f.matches(target_type)),
            ClassFilter::Negate(inner) => !inner.matches(target_type),
            ClassFilter::Custom(predicate) => predicate.matches(target_type),
        }
    }

    /// 并集；嵌套的并集会被展平，与 `True` 求并得到 `True`。
    pub fn or(self, other: ClassFilter) -> ClassFilter {
        if matches!(self, ClassFilter::True) || matches!(other, ClassFilter::True) {
            return ClassFilter::True;
        }
        let mut parts = Vec::new();
        for filter in [self, other] {
            match filter {
                ClassFilter::Union(inner) => parts.extend(inner.iter().cloned()),
                other => parts.push(other),
            }
        }
        ClassFilter::Union(Arc::from(parts))
    }

    /// 交集；嵌套的交集会被展平，`True` 作为单位元被省略。
    pub fn and(self, other: ClassFilter) -> ClassFilter {
        match (self, other) {
            (ClassFilter::True, other) | (other, ClassFilter::True) => other,
            (left, right) => {
                let mut parts = Vec::new();
                for filter in [left, right] {
                    match filter {
                        ClassFilter::Intersection(inner) => parts.extend(inner.iter().cloned()),
                        other => parts.push(other),
                    }
                }
                ClassFilter::Intersection(Arc::from(parts))
            }
        }
    }

    pub fn negate(self) -> ClassFilter {
        match self {
            ClassFilter::Negate(inner) => (*inner).clone(),
            other => ClassFilter::Negate(Arc::new(other)),
        }
    }
}

impl PartialEq for ClassFilter {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ClassFilter::True, ClassFilter::True) => true,
            (ClassFilter::AssignableTo(a), ClassFilter::AssignableTo(b))
            | (ClassFilter::Exact(a), ClassFilter::Exact(b))
            | (ClassFilter::NamePattern(a), ClassFilter::NamePattern(b)) => a == b,
            (ClassFilter::Union(a), ClassFilter::Union(b))
            | (ClassFilter::Intersection(a), ClassFilter::Intersection(b)) => a == b,
            (ClassFilter::Negate(a), ClassFilter::Negate(b)) => a == b,
            (ClassFilter::Custom(a), ClassFilter::Custom(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }
}

impl Eq for ClassFilter {}

impl Hash for ClassFilter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            ClassFilter::True => {}
            ClassFilter::AssignableTo(name)
            | ClassFilter::Exact(name)
            | ClassFilter::NamePattern(name) => name.hash(state),
            ClassFilter::Union(parts) | ClassFilter::Intersection(parts) => parts.hash(state),
            ClassFilter::Negate(inner) => inner.hash(state),
            ClassFilter::Custom(predicate) => {
                (Arc::as_ptr(predicate) as *const () as usize).hash(state)
            }
        }
    }
}

impl fmt::Debug for ClassFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassFilter::True => f.write_str("ClassFilter::True"),
            ClassFilter::AssignableTo(name) => write!(f, "AssignableTo({name})"),
            ClassFilter::Exact(name) => write!(f, "Exact({name})"),
            ClassFilter::NamePattern(pattern) => write!(f, "NamePattern({pattern})"),
            ClassFilter::Union(parts) => f.debug_tuple("Union").field(parts).finish(),
            ClassFilter::Intersection(parts) => f.debug_tuple("Intersection").field(parts).finish(),
            ClassFilter::Negate(inner) => f.debug_tuple("Negate").field(inner).finish(),
            ClassFilter::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
