//! 可观测性键名：日志 target 的单一事实来源。
//!
//! 教案式说明（Why）：各模块的 `tracing` 事件统一引用这里的常量，订阅方可以按 target 过滤
//! （例如 `RUST_LOG=spark_aop::target=debug`）。
//! 契约定义（What）：[`targets`] 中每个常量对应一个子系统；字段名以蛇形命名直接写在事件中。

/// 日志 target 分组。
pub mod targets {
    #[doc = "通知器注册、移除与排序。"]
    pub const REGISTRY: &str = "spark_aop::registry";

    #[doc = "优先级排序，包括检测到环时的降级告警。"]
    pub const PRECEDENCE: &str = "spark_aop::precedence";

    #[doc = "拦截链构建与缓存失效。"]
    pub const CHAIN: &str = "spark_aop::chain";

    #[doc = "每次代理调用的分派轨迹。"]
    pub const INVOCATION: &str = "spark_aop::invocation";

    #[doc = "目标源：池、线程绑定实例、热替换与销毁失败。"]
    pub const TARGET: &str = "spark_aop::target";
}

