use std::sync::Arc;

use dashmap::DashMap;

use crate::core::filter::GalleryFilter;
use crate::index::library::PhotoLibrary;
use crate::window::fetcher::LibraryFetcher;
use crate::window::manager::{PhotoWindow, WindowConfig};

/// 视图模式：同一逻辑集合可以同时存在一个项目视图和一个全局视图，
/// 各自独立的滚动位置 == 各自独立的窗口实例。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViewMode {
    /// 跨项目 union 视图（scope_id 固定 0）
    Union,
    /// 单项目视图（scope_id == project id）
    Project,
}

pub type SharedWindow = Arc<tokio::sync::Mutex<PhotoWindow<LibraryFetcher>>>;

/// 每 scope 一个窗口的显式注册表，由上层应用持有——不是隐式全局态。
///
/// 窗口跨渲染存活；`reset` 是显式操作（换过滤器、结构性变更时调用），
/// 绝不依赖隐式回收。跨 scope 复用同一窗口是禁止的：cursor 绑定 scope。
pub struct WindowRegistry {
    library: Arc<PhotoLibrary>,
    limit: usize,
    config: WindowConfig,
    windows: DashMap<(ViewMode, i64), SharedWindow>,
}

impl WindowRegistry {
    pub fn new(library: Arc<PhotoLibrary>, limit: usize, config: WindowConfig) -> Self {
        Self {
            library,
            limit,
            config,
            windows: DashMap::new(),
        }
    }

    /// 取 scope 对应的窗口；不存在则用给定过滤器新建。
    /// 已存在的窗口保持原有过滤器——换过滤器必须先 `reset`。
    pub fn get_or_create(
        &self,
        mode: ViewMode,
        scope_id: i64,
        filters: GalleryFilter,
    ) -> SharedWindow {
        self.windows
            .entry((mode, scope_id))
            .or_insert_with(|| {
                Arc::new(tokio::sync::Mutex::new(PhotoWindow::new(
                    LibraryFetcher::new(self.library.clone()),
                    filters,
                    self.limit,
                    self.config,
                )))
            })
            .clone()
    }

    /// 显式丢弃一个 scope 的缓存窗口。返回是否真的存在过。
    pub fn reset(&self, mode: ViewMode, scope_id: i64) -> bool {
        self.windows.remove(&(mode, scope_id)).is_some()
    }

    pub fn reset_all(&self) {
        self.windows.clear();
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// 汇总报告：库占用 + 各窗口占用。正被借用的窗口跳过（不阻塞）。
    pub fn report(&self) -> crate::stats::GalleryReport {
        crate::stats::GalleryReport {
            library: crate::stats::LibraryStats {
                photos: self.library.photo_count(),
                projects: self.library.project_count(),
                process_rss_bytes: crate::stats::read_process_rss(),
            },
            windows: self
                .windows
                .iter()
                .filter_map(|entry| entry.value().try_lock().ok().map(|w| w.stats()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::MediaKind;

    #[tokio::test]
    async fn scopes_get_independent_windows() {
        let lib = Arc::new(PhotoLibrary::new());
        let pid = lib.ensure_project("p", None);
        lib.ingest(pid, "a.jpg", "a.jpg", Some("2024-01-01".into()), 0, MediaKind::Photo);

        let registry = WindowRegistry::new(lib, 10, WindowConfig::default());
        let union = registry.get_or_create(ViewMode::Union, 0, GalleryFilter::default());
        let project = registry.get_or_create(
            ViewMode::Project,
            pid,
            GalleryFilter {
                projects: vec![pid],
                ..Default::default()
            },
        );
        assert_eq!(registry.window_count(), 2);

        // 同一 scope 拿回同一实例（跨渲染存活）
        let again = registry.get_or_create(ViewMode::Union, 0, GalleryFilter::default());
        assert!(Arc::ptr_eq(&union, &again));
        assert!(!Arc::ptr_eq(&union, &project));

        union.lock().await.load_initial().await.unwrap();
        assert_eq!(union.lock().await.total_items(), 1);

        let report = registry.report();
        assert_eq!(report.library.photos, 1);
        assert_eq!(report.windows.len(), 2);
        assert!(report.windows.iter().any(|w| w.items == 1));
    }

    #[tokio::test]
    async fn reset_is_explicit_and_scoped() {
        let lib = Arc::new(PhotoLibrary::new());
        let registry = WindowRegistry::new(lib, 10, WindowConfig::default());
        registry.get_or_create(ViewMode::Union, 0, GalleryFilter::default());
        registry.get_or_create(ViewMode::Project, 5, GalleryFilter::default());

        assert!(registry.reset(ViewMode::Project, 5));
        assert!(!registry.reset(ViewMode::Project, 5));
        assert_eq!(registry.window_count(), 1);

        registry.reset_all();
        assert_eq!(registry.window_count(), 0);
    }
}
