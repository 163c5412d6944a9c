use std::cmp::Ordering;
use std::collections::HashSet;

use crate::core::filter::GalleryFilter;
use crate::core::order::{SortDirection, SortField, SortKey};
use crate::core::record::PhotoRecord;
use crate::query::cursor::PageCursor;

/// 取页方向。Backward 取出的结果必须在取完后重新反转回正向扫描序。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageDirection {
    Forward,
    Backward,
}

/// keyset 边界谓词：相对某个 cursor 严格靠前/靠后。
///
/// 正确性支点：主排序值可重复（同一秒拍的两张照片），必须带 id tie-break，
/// 否则翻页在重复值处不收敛。desc + forward 的展开式：
/// `v < c.v OR (v = c.v AND id < c.id)`，asc 为镜像，backward 为逻辑取反。
#[derive(Clone, Debug)]
pub struct Boundary {
    cursor: PageCursor,
    direction: SortDirection,
    page_dir: PageDirection,
}

/// `None` 排序值在升序全序里低于一切 `Some`，与 core::order 的比较器一致。
fn cmp_sort_value(a: &Option<String>, b: &Option<String>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.cmp(b),
    }
}

impl Boundary {
    /// 扫描序比较：Less == key 在 cursor 之前被扫到。
    fn scan_cmp(&self, key: &SortKey) -> Ordering {
        let asc = cmp_sort_value(&key.sort_value, &self.cursor.sort_value)
            .then_with(|| key.id.cmp(&self.cursor.id));
        match self.direction {
            SortDirection::Asc => asc,
            SortDirection::Desc => asc.reverse(),
        }
    }

    /// key 是否落进本边界选中的半开区间。
    /// cursor 本身（值和 id 都相等）两个方向都不选——边界是排他的。
    pub fn admits(&self, key: &SortKey) -> bool {
        match self.page_dir {
            PageDirection::Forward => self.scan_cmp(key) == Ordering::Greater,
            PageDirection::Backward => self.scan_cmp(key) == Ordering::Less,
        }
    }
}

/// 一次取页的完整服务端计划：确定性排序 + 记录级合取过滤 + 可选 keyset 边界。
#[derive(Clone, Debug)]
pub struct QueryPlan {
    pub filter: GalleryFilter,
    pub sort_field: SortField,
    pub direction: SortDirection,
    pub boundary: Option<Boundary>,
}

impl QueryPlan {
    pub fn build(
        filter: &GalleryFilter,
        cursor: Option<PageCursor>,
        page_dir: PageDirection,
    ) -> Self {
        let boundary = cursor.map(|cursor| Boundary {
            cursor,
            direction: filter.direction,
            page_dir,
        });
        Self {
            filter: filter.clone(),
            sort_field: filter.sort_field,
            direction: filter.direction,
            boundary,
        }
    }

    /// scope 约束：显式项目列表按名单收；union 视图（空列表）排除归档项目。
    pub fn in_scope(&self, rec: &PhotoRecord, archived: &HashSet<i64>) -> bool {
        if self.filter.projects.is_empty() {
            !archived.contains(&rec.project_id)
        } else {
            self.filter.projects.contains(&rec.project_id)
        }
    }

    /// 过滤器 + scope 的合取（不含边界）；供 total 统计复用。
    pub fn matches(&self, rec: &PhotoRecord, archived: &HashSet<i64>) -> bool {
        self.in_scope(rec, archived) && self.filter.matches_record(rec)
    }

    /// 边界裁剪；无 cursor 时全通过。
    pub fn admits(&self, rec: &PhotoRecord) -> bool {
        match &self.boundary {
            None => true,
            Some(b) => b.admits(&SortKey::of(rec, self.sort_field)),
        }
    }
}
