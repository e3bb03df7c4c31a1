//! 显式的类型/方法描述符，取代运行期反射。
//!
//! # 设计背景（Why）
//! - 匹配与缓存都需要“方法身份”；以值语义的描述符在构建期一次性解析，调用期只做哈希查找；
//! - [`TypeDescriptor`] 记录类型名、实现的接口与父类型，足以支撑“可赋值给某类型”的判定。
//!
//! # 契约说明（What）
//! - 描述符按值比较与哈希，内部全部以 `Arc` 共享，克隆成本低；
//! - [`MethodDescriptor`] 同时作为拦截链缓存的键。

use std::fmt;
use std::sync::Arc;

/// 目标类型描述。
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    name: Arc<str>,
    interfaces: Arc<[Arc<str>]>,
    parent: Option<Arc<TypeDescriptor>>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            interfaces: Arc::from(Vec::new()),
            parent: None,
        }
    }

    /// 声明该类型直接实现的接口。
    pub fn implementing<I, S>(mut self, interfaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        let mut merged: Vec<Arc<str>> = self.interfaces.iter().cloned().collect();
        for interface in interfaces {
            let interface = interface.into();
            if !merged.contains(&interface) {
                merged.push(interface);
            }
        }
        self.interfaces = Arc::from(merged);
        self
    }

    /// 声明父类型。
    pub fn extending(mut self, parent: TypeDescriptor) -> Self {
        self.parent = Some(Arc::new(parent));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 直接声明的接口。
    pub fn interfaces(&self) -> &[Arc<str>] {
        &self.interfaces
    }

    pub fn parent(&self) -> Option<&TypeDescriptor> {
        self.parent.as_deref()
    }

    /// 本类型、祖先类型与它们实现的接口中是否包含 `type_name`。
    pub fn is_assignable_to(&self, type_name: &str) -> bool {
        let mut current = Some(self);
        while let Some(ty) = current {
            if &*ty.name == type_name || ty.interfaces.iter().any(|i| &**i == type_name) {
                return true;
            }
            current = ty.parent();
        }
        false
    }

    /// 沿继承链收集全部接口，按首次出现的顺序去重。
    pub fn all_interfaces(&self) -> Vec<Arc<str>> {
        let mut collected: Vec<Arc<str>> = Vec::new();
        let mut current = Some(self);
        while let Some(ty) = current {
            for interface in ty.interfaces.iter() {
                if !collected.contains(interface) {
                    collected.push(Arc::clone(interface));
                }
            }
            current = ty.parent();
        }
        collected
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("interfaces", &self.interfaces)
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .finish()
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// 方法描述：声明类型 + 方法名 + 参数类型签名。
///
/// # 教案式说明
/// - **意图（Why）**：代替反射得到的方法句柄，作为匹配输入与链缓存键；
/// - **契约（What）**：`declaring_type` 为声明该方法的类型或接口名；引入（Introduction）依据它判断
///   调用是否落在被引入的接口上。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    declaring_type: Arc<str>,
    name: Arc<str>,
    parameter_types: Arc<[Arc<str>]>,
}

impl MethodDescriptor {
    pub fn new<I, S>(
        declaring_type: impl Into<Arc<str>>,
        name: impl Into<Arc<str>>,
        parameter_types: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Self {
            declaring_type: declaring_type.into(),
            name: name.into(),
            parameter_types: parameter_types.into_iter().map(Into::into).collect(),
        }
    }

    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameter_types(&self) -> &[Arc<str>] {
        &self.parameter_types
    }

    /// 形如 `Calculator.add(i64, i64)` 的可读签名。
    pub fn signature(&self) -> String {
        let params: Vec<&str> = self.parameter_types.iter().map(|p| &**p).collect();
        format!("{}.{}({})", self.declaring_type, self.name, params.join(", "))
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature())
    }
}
