use serde::{Deserialize, Serialize};

use crate::core::record::{PhotoRecord, RecordSummary};

pub const DEFAULT_PAGE_LIMIT: usize = 100;
pub const MAX_PAGE_LIMIT: usize = 300;
pub const MIN_PAGE_LIMIT: usize = 1;

/// 越界 clamp 而不是拒绝：调用方传 0 或 10_000 都照常工作。
pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit
        .unwrap_or(DEFAULT_PAGE_LIMIT)
        .clamp(MIN_PAGE_LIMIT, MAX_PAGE_LIMIT)
}

/// 一页记录 + 两端 cursor。
///
/// - 非空页总是带 next/prev cursor（铸自首尾两条记录）；翻到头由下一次
///   fetch 返回空页 + null cursor 观察到。调用方终止条件只能看 cursor，
///   `total` 是 advisory（过滤后计数），并发变更下可能偏差。
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhotoPage {
    pub items: Vec<PhotoRecord>,
    pub next_cursor: Option<String>,
    pub prev_cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unfiltered_total: Option<u64>,
}

impl PhotoPage {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
            prev_cursor: None,
            total: None,
            unfiltered_total: None,
        }
    }
}

/// locate 命中响应：包含目标的那一页 + 页内下标 + 目标摘要。
/// 未命中走类型化 NotFound（HTTP 404），绝不用空页冒充。
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocateResponse {
    #[serde(flatten)]
    pub page: PhotoPage,
    pub idx_in_items: usize,
    pub target: RecordSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_clamps_instead_of_rejecting() {
        assert_eq!(clamp_limit(None), DEFAULT_PAGE_LIMIT);
        assert_eq!(clamp_limit(Some(0)), MIN_PAGE_LIMIT);
        assert_eq!(clamp_limit(Some(10_000)), MAX_PAGE_LIMIT);
        assert_eq!(clamp_limit(Some(25)), 25);
    }
}
