//! 通知器优先级排序。
//!
//! # 设计背景（Why）
//! - 优先级越高的通知器越先进入、越晚退出；数值顺序之外，同一切面内同序的通知器按声明位置
//!   打破平局，且后置类通知取相反方向，使“先声明的后置通知最后运行”；
//! - 该关系只是偏序：不同切面、同一数值顺序的通知器之间没有先后，保持输入顺序。
//!
//! # 契约说明（What）
//! - [`sort_advisors`] 为稳定拓扑排序：每一步输出输入顺序中第一个“没有剩余前驱”的通知器，
//!   先行关系只求值 n² 次；
//! - 对已排序列表再次排序得到原列表；
//! - 同一切面内混合后置与非后置通知可能构成环，此时记录告警并退化为仅按数值顺序的稳定排序。

use std::collections::BTreeSet;

use crate::advisor::Advisor;
use crate::observability::targets;

/// `a` 是否严格先于 `b`。
pub fn precedes(a: &Advisor, b: &Advisor) -> bool {
    let (left, right) = (a.precedence(), b.precedence());
    if left.order() != right.order() {
        return left.order() < right.order();
    }
    match (left.aspect(), right.aspect()) {
        (Some(x), Some(y)) if x.aspect() == y.aspect() => {
            if a.is_after() || b.is_after() {
                x.declaration_order() > y.declaration_order()
            } else {
                x.declaration_order() < y.declaration_order()
            }
        }
        _ => false,
    }
}

/// 返回按优先级排好序的新列表。
///
/// 先行关系只求值一次，随后按入度推进；每一步取输入下标最小的就绪项，与“取输入顺序中第一个
/// 没有剩余前驱的通知器”等价。
pub fn sort_advisors(advisors: &[Advisor]) -> Vec<Advisor> {
    let count = advisors.len();
    let successors: Vec<Vec<usize>> = advisors
        .iter()
        .enumerate()
        .map(|(i, advisor)| {
            (0..count)
                .filter(|&j| j != i && precedes(advisor, &advisors[j]))
                .collect()
        })
        .collect();
    let mut in_degree = vec![0_usize; count];
    for &next in successors.iter().flatten() {
        in_degree[next] += 1;
    }

    let mut ready: BTreeSet<usize> = (0..count).filter(|&i| in_degree[i] == 0).collect();
    let mut sorted = Vec::with_capacity(count);
    while let Some(index) = ready.pop_first() {
        sorted.push(advisors[index].clone());
        for &next in &successors[index] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.insert(next);
            }
        }
    }

    if sorted.len() < count {
        tracing::warn!(
            target: targets::PRECEDENCE,
            advisors = count,
            "precedence relation contains a cycle; falling back to numeric order"
        );
        let mut fallback = advisors.to_vec();
        fallback.sort_by_key(|a| a.precedence().order());
        return fallback;
    }
    sorted
}
