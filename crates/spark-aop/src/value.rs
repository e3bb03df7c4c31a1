//! 调用期值模型：类型擦除的参数/返回值、共享参数数组与调用属性表。
//!
//! # 设计背景（Why）
//! - 拦截链需要在不知道具体方法签名的情况下传递参数与返回值，因此采用 `Arc<dyn Any>` 擦除类型，
//!   克隆成本仅为一次引用计数；
//! - 参数数组必须保留“别名”语义：拦截器原地修改元素时，所有持有同一数组句柄的拦截器（包括更早
//!   执行的拦截器）都能观察到变化；整体替换数组则只影响之后的拦截器。[`Arguments`] 以共享句柄
//!   实现这一点。
//!
//! # 契约说明（What）
//! - [`Value`] 允许为空（`null`），对应“无返回值”或空引用参数；
//! - [`Arguments::set`] 原地修改，[`Arguments::detached`] 复制出独立存储；
//! - [`Attributes`] 在同一调用的拦截链内共享；调用克隆得到属性表的浅拷贝，之后互不影响。

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockReadGuard};

/// 类型擦除、可为空的调用值。
#[derive(Clone, Default)]
pub struct Value(Option<Arc<dyn Any + Send + Sync>>);

impl Value {
    /// 包装任意线程安全的值。
    pub fn new<T>(value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self(Some(Arc::new(value)))
    }

    /// 空值。
    pub const fn null() -> Self {
        Self(None)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    /// 以具体类型读取；类型不符或为空时返回 `None`。
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_deref().and_then(|inner| inner.downcast_ref::<T>())
    }

    /// 判断两个值是否指向同一份存储。
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (&self.0, &other.0) {
            (Some(left), Some(right)) => {
                std::ptr::addr_eq(Arc::as_ptr(left), Arc::as_ptr(right))
            }
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            None => f.write_str("Value(null)"),
            Some(_) => f.write_str("Value(..)"),
        }
    }
}

/// 调用参数数组的共享句柄。
///
/// # 教案式说明
/// - **意图（Why）**：实现参数别名语义，使动态切点能观察到更早拦截器对参数的原地修改；
/// - **逻辑（How）**：内部为 `Arc<RwLock<Vec<Value>>>`，克隆句柄即共享同一存储；
///   [`Arguments::detached`] 复制出新的存储；
/// - **契约（What）**：`set` 越界时返回 `None` 且不做修改；`read` 返回的守卫不得跨越对
///   同一句柄的写操作持有，否则会死锁。
#[derive(Clone, Default)]
pub struct Arguments {
    inner: Arc<RwLock<Vec<Value>>>,
}

impl Arguments {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(values)),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// 读取指定位置的参数。
    pub fn get(&self, index: usize) -> Option<Value> {
        self.inner.read().get(index).cloned()
    }

    /// 原地替换指定位置的参数，返回旧值。
    pub fn set(&self, index: usize, value: Value) -> Option<Value> {
        let mut guard = self.inner.write();
        guard
            .get_mut(index)
            .map(|slot| std::mem::replace(slot, value))
    }

    /// 复制当前参数列表（仅克隆引用计数）。
    pub fn snapshot(&self) -> Vec<Value> {
        self.inner.read().clone()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Vec<Value>> {
        self.inner.read()
    }

    /// 复制出与当前句柄互不影响的新参数数组。
    pub fn detached(&self) -> Arguments {
        Arguments::new(self.snapshot())
    }

    /// 两个句柄是否共享同一存储。
    pub fn shares_storage(&self, other: &Arguments) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl From<Vec<Value>> for Arguments {
    fn from(values: Vec<Value>) -> Self {
        Arguments::new(values)
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.read().iter()).finish()
    }
}

/// 调用级用户属性表，同一调用内的拦截器共享同一份表。
#[derive(Clone, Default)]
pub struct Attributes {
    inner: Arc<Mutex<HashMap<String, Value>>>,
}

impl Attributes {
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.lock().get(key).cloned()
    }

    /// 写入属性，返回旧值。
    pub fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.inner.lock().insert(key.into(), value)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.lock().remove(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// 复制出独立的属性表：条目按值复制（值本身只增加引用计数），之后的写入互不可见。
    pub fn detached(&self) -> Attributes {
        Attributes {
            inner: Arc::new(Mutex::new(self.inner.lock().clone())),
        }
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.inner.lock();
        f.debug_map().entries(guard.iter()).finish()
    }
}
