//! 通知器：通知（或引入）与其适用条件、优先级的组合。
//!
//! # 设计背景（Why）
//! - 通知器是链构建的输入单元；其优先级键（数值顺序 + 可选的切面声明位置）决定链内次序；
//! - 注册表与适配器分别位于 [`registry`] 与 [`adapter`] 子模块，前者维护排序后的快照与 epoch，
//!   后者把通知转换为可执行的拦截器。
//!
//! # 契约说明（What）
//! - 通知器构造后不可变，克隆只增加引用计数；
//! - 数值越小优先级越高，默认 [`LOWEST_PRECEDENCE`]。

pub mod adapter;
pub mod registry;

use std::sync::Arc;

use crate::advice::Advice;
use crate::introduction::IntroductionAdvisor;
use crate::matcher::Pointcut;

pub use adapter::{AdapterRegistry, AdvisorAdapter};
pub use registry::AdvisorRegistry;

/// 最高优先级（最先进入、最后退出）。
pub const HIGHEST_PRECEDENCE: i32 = i32::MIN;
/// 最低优先级，也是未显式排序时的默认值。
pub const LOWEST_PRECEDENCE: i32 = i32::MAX;

/// 通知器在所属切面中的声明位置。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AspectDeclaration {
    aspect: Arc<str>,
    declaration_order: u32,
}

impl AspectDeclaration {
    pub fn new(aspect: impl Into<Arc<str>>, declaration_order: u32) -> Self {
        Self {
            aspect: aspect.into(),
            declaration_order,
        }
    }

    pub fn aspect(&self) -> &str {
        &self.aspect
    }

    pub fn declaration_order(&self) -> u32 {
        self.declaration_order
    }
}

/// 排序键。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Precedence {
    order: i32,
    aspect: Option<AspectDeclaration>,
}

impl Precedence {
    pub fn new(order: i32) -> Self {
        Self {
            order,
            aspect: None,
        }
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn aspect(&self) -> Option<&AspectDeclaration> {
        self.aspect.as_ref()
    }
}

impl Default for Precedence {
    fn default() -> Self {
        Precedence::new(LOWEST_PRECEDENCE)
    }
}

/// 通知器主体：切点通知或引入。
#[derive(Clone, Debug)]
pub enum AdvisorBody {
    Pointcut { pointcut: Pointcut, advice: Advice },
    Introduction(IntroductionAdvisor),
}

/// 具名通知器。
///
/// # 教案式说明
/// - **意图（Why）**：名称用于日志、错误上下文以及 [`crate::Proxy::remove_advisor`] 的定位；
/// - **契约（What）**：`with_order` 与 `in_aspect` 为构建期链式配置，返回新的通知器值。
#[derive(Clone, Debug)]
pub struct Advisor {
    name: Arc<str>,
    precedence: Precedence,
    body: AdvisorBody,
}

impl Advisor {
    pub fn new(name: impl Into<Arc<str>>, pointcut: Pointcut, advice: Advice) -> Self {
        Self {
            name: name.into(),
            precedence: Precedence::default(),
            body: AdvisorBody::Pointcut { pointcut, advice },
        }
    }

    pub fn introduction(name: impl Into<Arc<str>>, introduction: IntroductionAdvisor) -> Self {
        Self {
            name: name.into(),
            precedence: Precedence::default(),
            body: AdvisorBody::Introduction(introduction),
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.precedence.order = order;
        self
    }

    pub fn in_aspect(mut self, aspect: impl Into<Arc<str>>, declaration_order: u32) -> Self {
        self.precedence.aspect = Some(AspectDeclaration::new(aspect, declaration_order));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    pub fn precedence(&self) -> &Precedence {
        &self.precedence
    }

    pub fn body(&self) -> &AdvisorBody {
        &self.body
    }

    /// 后置类通知参与同切面排序时取相反的声明顺序。
    pub fn is_after(&self) -> bool {
        match &self.body {
            AdvisorBody::Pointcut { advice, .. } => advice.is_after(),
            AdvisorBody::Introduction(_) => false,
        }
    }
}
