//! 当前代理暴露：让目标对象或通知在调用期间取得“正在执行的代理”。
//!
//! 仅当代理设置了 `expose_proxy` 时生效。线程本地保存一个栈，嵌套的代理调用各自压栈，
//! 守卫析构时弹出，因此调用结束（包括错误返回）后自动恢复外层代理。

use std::cell::RefCell;
use std::marker::PhantomData;

use crate::proxy::Proxy;

thread_local! {
    static CURRENT: RefCell<Vec<Proxy>> = const { RefCell::new(Vec::new()) };
}

/// 当前线程上正在执行、且开启了暴露的最内层代理。
pub fn current_proxy() -> Option<Proxy> {
    CURRENT.with(|stack| stack.borrow().last().cloned())
}

/// 暴露守卫，析构时撤销本次暴露。不可跨线程移动。
#[must_use]
pub(crate) struct Exposure {
    _thread_bound: PhantomData<*const ()>,
}

pub(crate) fn expose(proxy: Proxy) -> Exposure {
    CURRENT.with(|stack| stack.borrow_mut().push(proxy));
    Exposure {
        _thread_bound: PhantomData,
    }
}

impl Drop for Exposure {
    fn drop(&mut self) {
        CURRENT.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}
