use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::core::filter::GalleryFilter;
use crate::core::order::{sort_records, SortKey};
use crate::core::record::{identity_key, MediaKind, PhotoRecord, Project, RecordSummary};
use crate::event::ChangeEvent;
use crate::query::cursor::PageCursor;
use crate::query::page::{clamp_limit, LocateResponse, PhotoPage};
use crate::query::predicate::{PageDirection, QueryPlan};

#[derive(Debug, Error)]
pub enum GalleryError {
    /// deep-link 未命中：目标不存在，或被当前过滤器排除。
    /// 必须与“空页”可区分——调用方拿到它就不该再顺序翻页找。
    #[error("photo not found: {0}")]
    NotFound(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// 内存照片库：谓词层背后的最小可查询协作者。
///
/// 物理存储/索引是边界外的事；这里只要求两个操作语义正确：
/// `fetch_page`（keyset 取页）和 `locate`（一次定位查询）。
/// 每次变更通过 broadcast 发 ChangeEvent，掉队的订阅者收到 Lagged
/// 后应当 reset 自己的窗口。
pub struct PhotoLibrary {
    records: RwLock<HashMap<i64, PhotoRecord>>,
    /// identity key -> record id（去重身份，不参与排序）
    identity: RwLock<HashMap<String, i64>>,
    projects: RwLock<HashMap<i64, Project>>,
    project_roots: RwLock<HashMap<i64, PathBuf>>,
    next_record_id: AtomicI64,
    next_project_id: AtomicI64,
    events: broadcast::Sender<ChangeEvent>,
}

impl Default for PhotoLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl PhotoLibrary {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            records: RwLock::new(HashMap::new()),
            identity: RwLock::new(HashMap::new()),
            projects: RwLock::new(HashMap::new()),
            project_roots: RwLock::new(HashMap::new()),
            next_record_id: AtomicI64::new(1),
            next_project_id: AtomicI64::new(1),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: ChangeEvent) {
        // 没有订阅者时 send 返回 Err，属正常情况
        let _ = self.events.send(event);
    }

    // ─── 项目 ───

    pub fn ensure_project(&self, name: &str, root: Option<&Path>) -> i64 {
        {
            let projects = self.projects.read();
            if let Some(p) = projects.values().find(|p| p.name == name) {
                return p.id;
            }
        }
        let id = self.next_project_id.fetch_add(1, Ordering::Relaxed);
        self.projects.write().insert(
            id,
            Project {
                id,
                name: name.to_string(),
                archived: false,
            },
        );
        if let Some(root) = root {
            self.project_roots.write().insert(id, root.to_path_buf());
        }
        id
    }

    pub fn set_archived(&self, project_id: i64, archived: bool) -> bool {
        let mut projects = self.projects.write();
        match projects.get_mut(&project_id) {
            Some(p) => {
                p.archived = archived;
                true
            }
            None => false,
        }
    }

    /// path 归属的项目（最长 root 前缀匹配），供 watcher 映射事件。
    pub fn project_for_path(&self, path: &Path) -> Option<(i64, PathBuf)> {
        let roots = self.project_roots.read();
        roots
            .iter()
            .filter(|(_, root)| path.starts_with(root))
            .max_by_key(|(_, root)| root.as_os_str().len())
            .map(|(id, root)| (*id, root.clone()))
    }

    fn archived_set(&self) -> HashSet<i64> {
        self.projects
            .read()
            .values()
            .filter(|p| p.archived)
            .map(|p| p.id)
            .collect()
    }

    // ─── 记录变更 ───

    /// 幂等插入：同一身份键已存在时返回 None（扫描与 watcher 重放都走这里）。
    pub fn ingest(
        &self,
        project_id: i64,
        file_name: &str,
        rel_path: &str,
        taken_at: Option<String>,
        size: u64,
        kind: MediaKind,
    ) -> Option<i64> {
        let key = identity_key(project_id, file_name);
        // 查重与分配 id 在同一把写锁下，并发重放不会产出孤儿记录
        let id = {
            let mut identity = self.identity.write();
            if identity.contains_key(&key) {
                return None;
            }
            let id = self.next_record_id.fetch_add(1, Ordering::Relaxed);
            identity.insert(key, id);
            id
        };
        let record = PhotoRecord {
            id,
            project_id,
            file_name: file_name.to_string(),
            rel_path: rel_path.to_string(),
            taken_at,
            size,
            kind,
            favorite: false,
            tags: Vec::new(),
        };
        self.records.write().insert(id, record.clone());
        self.emit(ChangeEvent::Insert(record));
        Some(id)
    }

    pub fn remove(&self, project_id: i64, file_name: &str) -> bool {
        let key = identity_key(project_id, file_name);
        let removed_id = self.identity.write().remove(&key);
        match removed_id {
            Some(id) => {
                self.records.write().remove(&id);
                self.emit(ChangeEvent::Remove { key });
                true
            }
            None => false,
        }
    }

    pub fn set_favorite(&self, record_id: i64, favorite: bool) -> bool {
        let key = {
            let mut records = self.records.write();
            match records.get_mut(&record_id) {
                Some(rec) => {
                    rec.favorite = favorite;
                    rec.identity_key()
                }
                None => return false,
            }
        };
        self.emit(ChangeEvent::Update {
            key,
            favorite: Some(favorite),
            tags: None,
        });
        true
    }

    pub fn set_tags(&self, record_id: i64, tags: Vec<String>) -> bool {
        let key = {
            let mut records = self.records.write();
            match records.get_mut(&record_id) {
                Some(rec) => {
                    rec.tags = tags.clone();
                    rec.identity_key()
                }
                None => return false,
            }
        };
        self.emit(ChangeEvent::Update {
            key,
            favorite: None,
            tags: Some(tags),
        });
        true
    }

    pub fn photo_count(&self) -> usize {
        self.records.read().len()
    }

    pub fn project_count(&self) -> usize {
        self.projects.read().len()
    }

    // ─── 查询 ───

    /// 过滤 + 扫描序排序后的快照。持锁期间只做 clone，比较在锁外。
    fn matching_sorted(&self, plan: &QueryPlan) -> (Vec<PhotoRecord>, u64) {
        let archived = self.archived_set();
        let unfiltered_total;
        let mut matching: Vec<PhotoRecord> = {
            let records = self.records.read();
            unfiltered_total = records.len() as u64;
            records
                .values()
                .filter(|r| plan.matches(r, &archived))
                .cloned()
                .collect()
        };
        sort_records(&mut matching, plan.sort_field, plan.direction);
        (matching, unfiltered_total)
    }

    fn wire_cursor(&self, rec: &PhotoRecord, plan: &QueryPlan) -> String {
        let key = SortKey::of(rec, plan.sort_field);
        PageCursor::new(key.sort_value, key.id).encode()
    }

    /// keyset 取页。`cursor`/`before` 最多设一个；都不设 == 第一页。
    ///
    /// backward 语义：按反向扫描收集，再整体反转回正向扫描序返回——
    /// 无论哪个方向触发的 fetch，items 永远是 canonical 顺序。
    pub fn fetch_page(
        &self,
        filter: &GalleryFilter,
        cursor: Option<PageCursor>,
        before: Option<PageCursor>,
        limit: Option<usize>,
    ) -> Result<PhotoPage, GalleryError> {
        if cursor.is_some() && before.is_some() {
            return Err(GalleryError::InvalidRequest(
                "cursor and before_cursor are mutually exclusive".into(),
            ));
        }
        let limit = clamp_limit(limit);
        let page_dir = if before.is_some() {
            PageDirection::Backward
        } else {
            PageDirection::Forward
        };
        let plan = QueryPlan::build(filter, before.or(cursor), page_dir);
        let (matching, unfiltered_total) = self.matching_sorted(&plan);
        let total = matching.len() as u64;

        let items: Vec<PhotoRecord> = match page_dir {
            PageDirection::Forward => matching
                .iter()
                .filter(|r| plan.admits(r))
                .take(limit)
                .cloned()
                .collect(),
            PageDirection::Backward => {
                let mut rev: Vec<PhotoRecord> = matching
                    .iter()
                    .rev()
                    .filter(|r| plan.admits(r))
                    .take(limit)
                    .cloned()
                    .collect();
                rev.reverse();
                rev
            }
        };

        let next_cursor = items.last().map(|r| self.wire_cursor(r, &plan));
        let prev_cursor = items.first().map(|r| self.wire_cursor(r, &plan));
        Ok(PhotoPage {
            items,
            next_cursor,
            prev_cursor,
            total: Some(total),
            unfiltered_total: Some(unfiltered_total),
        })
    }

    /// deep-link：一次定位查询。
    ///
    /// 在当前过滤器 + 排序下算出目标的绝对 rank，返回按 limit 对齐、
    /// 包含目标的那一页和页内下标。目标不存在或被过滤掉 → NotFound，
    /// 调用方绝不应该退化成顺序翻页搜索。
    pub fn locate(
        &self,
        project_id: Option<i64>,
        file_name: &str,
        filter: &GalleryFilter,
        limit: Option<usize>,
    ) -> Result<LocateResponse, GalleryError> {
        let limit = clamp_limit(limit);
        let plan = QueryPlan::build(filter, None, PageDirection::Forward);
        let (matching, unfiltered_total) = self.matching_sorted(&plan);

        // 身份匹配走 NFC 归一后的键；未给 project 时按文件名在全 scope 内找第一个
        let rank = matching
            .iter()
            .position(|r| {
                let same_name = r.identity_key() == identity_key(r.project_id, file_name);
                match project_id {
                    Some(pid) => same_name && r.project_id == pid,
                    None => same_name,
                }
            })
            .ok_or_else(|| GalleryError::NotFound(file_name.to_string()))?;

        let total = matching.len() as u64;
        let page_start = rank - rank % limit;
        let page_items: Vec<PhotoRecord> = matching
            .iter()
            .skip(page_start)
            .take(limit)
            .cloned()
            .collect();
        let target = RecordSummary::from(&page_items[rank - page_start]);
        let next_cursor = page_items.last().map(|r| self.wire_cursor(r, &plan));
        let prev_cursor = page_items.first().map(|r| self.wire_cursor(r, &plan));

        Ok(LocateResponse {
            page: PhotoPage {
                items: page_items,
                next_cursor,
                prev_cursor,
                total: Some(total),
                unfiltered_total: Some(unfiltered_total),
            },
            idx_in_items: rank - page_start,
            target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::MediaKind;

    fn seeded() -> (PhotoLibrary, i64) {
        let lib = PhotoLibrary::new();
        let pid = lib.ensure_project("trip", None);
        lib.ingest(pid, "a.jpg", "a.jpg", Some("2024-01-01".into()), 10, MediaKind::Photo); // id 1
        lib.ingest(pid, "b.jpg", "b.jpg", Some("2024-02-01".into()), 20, MediaKind::Photo); // id 2
        lib.ingest(pid, "c.jpg", "c.jpg", Some("2024-01-01".into()), 30, MediaKind::Photo); // id 3
        (lib, pid)
    }

    fn decode(cursor: &Option<String>) -> PageCursor {
        PageCursor::decode(cursor.as_deref().unwrap()).unwrap()
    }

    #[test]
    fn tie_break_pages_of_one() {
        // 同 sortValue 的两条记录（a.jpg id=1, c.jpg id=3），desc，页大小 1：
        // 先出 id 大者，cursor 指向它，下一页出 id 小者，再下一页空 + null
        let (lib, _) = seeded();
        let filter = GalleryFilter::default();

        let p1 = lib.fetch_page(&filter, None, None, Some(1)).unwrap();
        assert_eq!(p1.items[0].id, 2); // 2024-02-01 最新

        let c1 = decode(&p1.next_cursor);
        let p2 = lib.fetch_page(&filter, Some(c1), None, Some(1)).unwrap();
        assert_eq!(p2.items[0].id, 3);
        let c2 = decode(&p2.next_cursor);
        assert_eq!(c2.sort_value.as_deref(), Some("2024-01-01"));
        assert_eq!(c2.id, 3);

        let p3 = lib.fetch_page(&filter, Some(c2), None, Some(1)).unwrap();
        assert_eq!(p3.items[0].id, 1);

        let c3 = decode(&p3.next_cursor);
        let p4 = lib.fetch_page(&filter, Some(c3), None, Some(1)).unwrap();
        assert!(p4.items.is_empty());
        assert!(p4.next_cursor.is_none());
        assert!(p4.prev_cursor.is_none());
    }

    #[test]
    fn forward_pages_concatenate_in_scan_order_without_duplicates() {
        let lib = PhotoLibrary::new();
        let pid = lib.ensure_project("bulk", None);
        for i in 0..23 {
            // 故意制造大量重复 sortValue，考验 tie-break
            let day = format!("2024-01-{:02}", (i % 5) + 1);
            lib.ingest(
                pid,
                &format!("f{i}.jpg"),
                &format!("f{i}.jpg"),
                Some(day),
                i,
                MediaKind::Photo,
            );
        }
        let filter = GalleryFilter::default();

        let mut seen = std::collections::HashSet::new();
        let mut all: Vec<PhotoRecord> = Vec::new();
        let mut cursor = None;
        loop {
            let page = lib.fetch_page(&filter, cursor, None, Some(4)).unwrap();
            if page.items.is_empty() {
                assert!(page.next_cursor.is_none());
                break;
            }
            for item in &page.items {
                assert!(seen.insert(item.identity_key()), "duplicate across pages");
                all.push(item.clone());
            }
            cursor = Some(decode(&page.next_cursor));
        }
        assert_eq!(all.len(), 23);
        for pair in all.windows(2) {
            let a = SortKey::of(&pair[0], crate::core::order::SortField::TakenAt);
            let b = SortKey::of(&pair[1], crate::core::order::SortField::TakenAt);
            assert_eq!(
                a.cmp_scan(&b, crate::core::order::SortDirection::Desc),
                std::cmp::Ordering::Less
            );
        }
    }

    #[test]
    fn backward_fetch_returns_canonical_order() {
        let (lib, _) = seeded();
        let filter = GalleryFilter::default();

        // 先走到末尾，再用 before_cursor 往回取
        let p1 = lib.fetch_page(&filter, None, None, Some(2)).unwrap();
        let ids: Vec<i64> = p1.items.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3]);

        let head = decode(&p1.prev_cursor);
        let before_head = lib.fetch_page(&filter, None, Some(head), Some(2)).unwrap();
        assert!(before_head.items.is_empty());

        let tail = decode(&p1.next_cursor);
        let p2 = lib.fetch_page(&filter, Some(tail), None, Some(2)).unwrap();
        assert_eq!(p2.items[0].id, 1);

        // 从 p2 的头往回取：拿回 p1 的内容且保持正向顺序
        let back = lib
            .fetch_page(&filter, None, Some(decode(&p2.prev_cursor)), Some(2))
            .unwrap();
        let ids: Vec<i64> = back.items.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn both_cursors_is_invalid() {
        let (lib, _) = seeded();
        let c = PageCursor::new(Some("2024-01-01".into()), 1);
        let err = lib
            .fetch_page(&GalleryFilter::default(), Some(c.clone()), Some(c), None)
            .unwrap_err();
        assert!(matches!(err, GalleryError::InvalidRequest(_)));
    }

    #[test]
    fn archived_projects_drop_out_of_union_view() {
        let (lib, pid) = seeded();
        let other = lib.ensure_project("archived", None);
        lib.ingest(other, "x.jpg", "x.jpg", Some("2030-01-01".into()), 1, MediaKind::Photo);
        lib.set_archived(other, true);

        let page = lib
            .fetch_page(&GalleryFilter::default(), None, None, None)
            .unwrap();
        assert_eq!(page.items.len(), 3);
        assert!(page.items.iter().all(|r| r.project_id == pid));

        // 显式 scope 仍可进入归档项目
        let scoped = GalleryFilter {
            projects: vec![other],
            ..Default::default()
        };
        let page = lib.fetch_page(&scoped, None, None, None).unwrap();
        assert_eq!(page.items.len(), 1);
    }

    #[test]
    fn locate_returns_page_and_index() {
        let lib = PhotoLibrary::new();
        let pid = lib.ensure_project("trip", None);
        for i in 0..10 {
            lib.ingest(
                pid,
                &format!("f{i}.jpg"),
                &format!("f{i}.jpg"),
                Some(format!("2024-01-{:02}", i + 1)),
                0,
                MediaKind::Photo,
            );
        }
        // desc：f9 (01-10) rank 0 … f0 (01-01) rank 9；f3 rank 6 → 第二页（limit 4），页内下标 2
        let found = lib
            .locate(Some(pid), "f3.jpg", &GalleryFilter::default(), Some(4))
            .unwrap();
        assert_eq!(found.idx_in_items, 2);
        assert_eq!(found.page.items.len(), 4);
        assert_eq!(found.page.items[found.idx_in_items].file_name, "f3.jpg");
        assert_eq!(found.target.file_name, "f3.jpg");
    }

    #[test]
    fn locate_miss_is_not_found_not_empty_page() {
        let (lib, pid) = seeded();
        let err = lib
            .locate(Some(pid), "ghost.jpg", &GalleryFilter::default(), None)
            .unwrap_err();
        assert!(matches!(err, GalleryError::NotFound(_)));

        // 存在但被过滤掉 → 同样 NotFound
        let filter = GalleryFilter {
            favorite_only: true,
            ..Default::default()
        };
        let err = lib.locate(Some(pid), "a.jpg", &filter, None).unwrap_err();
        assert!(matches!(err, GalleryError::NotFound(_)));
    }

    #[test]
    fn mutations_emit_change_events() {
        let lib = PhotoLibrary::new();
        let mut rx = lib.subscribe();
        let pid = lib.ensure_project("p", None);

        let id = lib
            .ingest(pid, "a.jpg", "a.jpg", None, 1, MediaKind::Photo)
            .unwrap();
        assert!(matches!(rx.try_recv().unwrap(), ChangeEvent::Insert(_)));

        lib.set_favorite(id, true);
        assert!(matches!(
            rx.try_recv().unwrap(),
            ChangeEvent::Update {
                favorite: Some(true),
                ..
            }
        ));

        lib.remove(pid, "a.jpg");
        assert!(matches!(rx.try_recv().unwrap(), ChangeEvent::Remove { .. }));
    }

    #[test]
    fn ingest_is_idempotent_per_identity() {
        let lib = PhotoLibrary::new();
        let pid = lib.ensure_project("p", None);
        assert!(lib.ingest(pid, "a.jpg", "a.jpg", None, 1, MediaKind::Photo).is_some());
        assert!(lib.ingest(pid, "a.jpg", "a.jpg", None, 2, MediaKind::Photo).is_none());
        assert_eq!(lib.photo_count(), 1);
    }
}
