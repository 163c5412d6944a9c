use std::cmp::Ordering;

use crate::core::order::SortKey;
use crate::event::ChangeEvent;
use crate::window::fetcher::PageFetcher;
use crate::window::manager::PhotoWindow;

/// 一次 delta 应用的结果（语义集中定义，不在各调用点 ad hoc 改数组）。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeltaOutcome {
    Inserted,
    Removed,
    Updated,
    /// 与本窗口无关：不匹配过滤器、落在已缓存区间之外、或键未知
    Ignored,
}

impl<F: PageFetcher> PhotoWindow<F> {
    /// 把一条外部变更事件并入已缓存的窗口。
    ///
    /// - Insert：只有记录匹配过滤器、且按当前排序落在已缓存区间之内才插入
    ///   （区间外的记录翻页自然会取到，现在塞进来反而制造空洞）。
    /// - Remove：按身份键摘除；页变空也保留该页——它的 cursor 仍是有效边界。
    /// - Update：字段级覆写，不改变排序位置（taken_at/id 不可变）。
    ///
    /// 结构性变更（项目归档、排序字段变化）不在此处理，调用方应 reset。
    pub fn apply_delta(&mut self, event: &ChangeEvent) -> DeltaOutcome {
        match event {
            ChangeEvent::Insert(rec) => {
                let key = rec.identity_key();
                if self.seen.contains(&key) {
                    return DeltaOutcome::Ignored;
                }
                // 记录级过滤 + 显式项目 scope；归档状态客户端不可见，
                // 归档类变更由调用方 reset 兜底
                let filters = self.filters().clone();
                if !filters.matches_record(rec) {
                    return DeltaOutcome::Ignored;
                }
                if !filters.projects.is_empty() && !filters.projects.contains(&rec.project_id) {
                    return DeltaOutcome::Ignored;
                }

                let field = filters.sort_field;
                let direction = filters.direction;
                let rec_key = SortKey::of(rec, field);

                let span = {
                    let mut it = self.items();
                    let first = it.next().map(|r| SortKey::of(r, field));
                    let last = self.items().last().map(|r| SortKey::of(r, field));
                    first.zip(last)
                };
                let Some((first, last)) = span else {
                    // 空窗口没有覆盖区间可言
                    return DeltaOutcome::Ignored;
                };
                if rec_key.cmp_scan(&first, direction) == Ordering::Less
                    || rec_key.cmp_scan(&last, direction) == Ordering::Greater
                {
                    return DeltaOutcome::Ignored;
                }

                // 找第一个扫描序在 rec 之后的条目，插到它前面
                for page in self.pages.iter_mut() {
                    let pos = page.items.iter().position(|item| {
                        SortKey::of(item, field).cmp_scan(&rec_key, direction) == Ordering::Greater
                    });
                    if let Some(pos) = pos {
                        page.items.insert(pos, rec.clone());
                        self.seen.insert(key);
                        return DeltaOutcome::Inserted;
                    }
                }
                // 区间内却没找到插入点：只可能是区间端点本身，已被 seen 拦截
                DeltaOutcome::Ignored
            }

            ChangeEvent::Remove { key } => {
                if !self.seen.remove(key) {
                    return DeltaOutcome::Ignored;
                }
                for page in self.pages.iter_mut() {
                    if let Some(pos) = page.items.iter().position(|r| &r.identity_key() == key) {
                        page.items.remove(pos);
                        break;
                    }
                }
                DeltaOutcome::Removed
            }

            ChangeEvent::Update {
                key,
                favorite,
                tags,
            } => {
                for page in self.pages.iter_mut() {
                    if let Some(item) = page.items.iter_mut().find(|r| &r.identity_key() == key) {
                        if let Some(fav) = favorite {
                            item.favorite = *fav;
                        }
                        if let Some(tags) = tags {
                            item.tags = tags.clone();
                        }
                        return DeltaOutcome::Updated;
                    }
                }
                DeltaOutcome::Ignored
            }
        }
    }
}
