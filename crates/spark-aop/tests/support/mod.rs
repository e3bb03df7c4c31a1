//! 集成测试共享夹具：计算器目标、计数工厂与调用轨迹记录器。
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use spark_aop::{
    BoxError, InvocationError, MethodDescriptor, Target, TargetFactory, TargetRef,
    TypeDescriptor, Value,
};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("division by zero")]
pub struct DivideByZero;

pub fn calculator_type() -> TypeDescriptor {
    TypeDescriptor::new("BasicCalculator").implementing(["Calculator"])
}

pub fn add() -> MethodDescriptor {
    MethodDescriptor::new("Calculator", "add", ["i64", "i64"])
}

pub fn subtract() -> MethodDescriptor {
    MethodDescriptor::new("Calculator", "subtract", ["i64", "i64"])
}

pub fn div() -> MethodDescriptor {
    MethodDescriptor::new("Calculator", "div", ["i64", "i64"])
}

pub fn whoami() -> MethodDescriptor {
    MethodDescriptor::new("Calculator", "whoami", Vec::<&str>::new())
}

pub fn args(a: i64, b: i64) -> Vec<Value> {
    vec![Value::new(a), Value::new(b)]
}

pub fn as_i64(value: &Value) -> i64 {
    *value.downcast_ref::<i64>().expect("i64 result")
}

fn int_arg(args: &[Value], index: usize) -> Result<i64, InvocationError> {
    args.get(index)
        .and_then(|v| v.downcast_ref::<i64>().copied())
        .ok_or_else(|| InvocationError::UnsupportedMethod {
            method: format!("argument {index} is not an i64"),
        })
}

/// 记录自身调用次数与实例编号的计算器。
pub struct Calculator {
    pub id: usize,
    pub calls: AtomicUsize,
}

impl Calculator {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Target for Calculator {
    fn invoke(&self, method: &MethodDescriptor, args: &[Value]) -> Result<Value, InvocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match method.name() {
            "add" => Ok(Value::new(int_arg(args, 0)? + int_arg(args, 1)?)),
            "subtract" => Ok(Value::new(int_arg(args, 0)? - int_arg(args, 1)?)),
            "div" => {
                let divisor = int_arg(args, 1)?;
                if divisor == 0 {
                    return Err(InvocationError::raised(DivideByZero));
                }
                Ok(Value::new(int_arg(args, 0)? / divisor))
            }
            "whoami" => Ok(Value::new(self.id)),
            _ => Err(InvocationError::UnsupportedMethod {
                method: method.signature(),
            }),
        }
    }
}

/// 以单例目标源包装一个计算器，返回代理工厂与目标句柄。
pub fn singleton_calculator() -> (spark_aop::ProxyFactory, Arc<Calculator>) {
    let calculator = Arc::new(Calculator::new(0));
    let target: TargetRef = calculator.clone();
    let source = spark_aop::SingletonTargetSource::new(target, calculator_type());
    (spark_aop::ProxyFactory::new(source), calculator)
}

pub fn target_calls(calculator: &Calculator) -> usize {
    calculator.calls.load(Ordering::SeqCst)
}

/// 每次创建新计算器的原型工厂，统计创建与销毁次数。
#[derive(Default)]
pub struct CountingFactory {
    pub created: AtomicUsize,
    pub destroyed: AtomicUsize,
    pub fail_destroy_of: Option<usize>,
}

impl CountingFactory {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Error)]
#[error("refusing to destroy calculator {0}")]
pub struct DestroyRefused(pub usize);

impl TargetFactory for CountingFactory {
    fn target_type(&self) -> TypeDescriptor {
        calculator_type()
    }

    fn create(&self) -> Result<TargetRef, BoxError> {
        let id = self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(Calculator::new(id)))
    }

    fn destroy(&self, target: TargetRef) -> Result<(), BoxError> {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        let id = target
            .invoke(&whoami(), &[])
            .ok()
            .and_then(|v| v.downcast_ref::<usize>().copied());
        match (id, self.fail_destroy_of) {
            (Some(id), Some(refused)) if id == refused => Err(Box::new(DestroyRefused(id))),
            _ => Ok(()),
        }
    }
}

/// 线程安全的调用轨迹。
#[derive(Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<String>>>);

impl Trace {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}
