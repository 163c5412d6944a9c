use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use notify::{Config, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::index::library::PhotoLibrary;
use crate::index::scan::record_fields;

/// 照片根目录的文件系统监听：create/remove 直接映射成库变更，
/// 库再以 ChangeEvent 广播给各个窗口订阅者。
///
/// bounded channel 做背压：队列满时丢弃并计数，不无限堆积。
pub struct LibraryWatcher;

impl LibraryWatcher {
    /// 返回 (watcher, 泵任务句柄)。watcher 必须由调用方持有，drop 即停止监听。
    pub fn start(
        library: Arc<PhotoLibrary>,
        channel_size: usize,
        overflow_drops: Arc<AtomicU64>,
    ) -> anyhow::Result<(notify::RecommendedWatcher, tokio::task::JoinHandle<()>)> {
        let (tx, mut rx) = mpsc::channel(channel_size);

        let watcher = notify::RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| {
                if let Ok(event) = res {
                    if tx.try_send(event).is_err() {
                        let drops = overflow_drops.fetch_add(1, Ordering::Relaxed);
                        if drops % 1000 == 0 {
                            tracing::warn!("fs event channel overflow, total drops: {}", drops + 1);
                        }
                    }
                }
            },
            Config::default(),
        )?;

        let pump = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                apply_fs_event(&library, &event);
            }
        });

        Ok((watcher, pump))
    }

    pub fn watch_roots(watcher: &mut notify::RecommendedWatcher, roots: &[PathBuf]) {
        for root in roots {
            if let Err(e) = watcher.watch(root, RecursiveMode::Recursive) {
                tracing::warn!("failed to watch {:?}: {}", root, e);
            }
        }
    }
}

/// notify 事件 → 库变更。非媒体文件与根目录之外的路径直接忽略。
fn apply_fs_event(library: &PhotoLibrary, event: &notify::Event) {
    use notify::EventKind;

    for path in &event.paths {
        let Some((project_id, root)) = library.project_for_path(path) else {
            continue;
        };
        match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) => {
                // ingest 按身份键幂等；Modify 对已有记录是 no-op
                if path.is_file() {
                    if let Some((file_name, rel_path, taken_at, size, kind)) =
                        record_fields(&root, path)
                    {
                        if library
                            .ingest(project_id, &file_name, &rel_path, taken_at, size, kind)
                            .is_some()
                        {
                            tracing::debug!("watcher ingested {:?}", path);
                        }
                    }
                }
            }
            EventKind::Remove(_) => {
                if let Some(file_name) = path.file_name().map(|n| n.to_string_lossy()) {
                    if library.remove(project_id, &file_name) {
                        tracing::debug!("watcher removed {:?}", path);
                    }
                }
            }
            _ => {}
        }
    }
}
