use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use ignore::WalkBuilder;

use crate::core::record::MediaKind;
use crate::index::library::PhotoLibrary;

/// mtime → 排序友好的时间串（字典序 == 时间序，可直接当 cursor sortValue）
pub fn timestamp_string(ts: SystemTime) -> String {
    DateTime::<Local>::from(ts)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// 从文件系统路径提取一条记录的字段；非媒体扩展名返回 None。
pub fn record_fields(root: &Path, path: &Path) -> Option<(String, String, Option<String>, u64, MediaKind)> {
    let kind = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(MediaKind::from_extension)?;
    let file_name = path.file_name()?.to_string_lossy().into_owned();
    let rel_path = path
        .strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned();
    let metadata = std::fs::metadata(path).ok();
    let size = metadata.as_ref().map(|m| m.len()).unwrap_or(0);
    let taken_at = metadata.and_then(|m| m.modified().ok()).map(timestamp_string);
    Some((file_name, rel_path, taken_at, size, kind))
}

/// 启动时一次性发现：每个照片根目录成为一个项目，目录下的媒体文件
/// 幂等落库。后台周期性补扫/合并是边界外的编排，不在这里。
pub fn scan_roots(library: &PhotoLibrary, roots: &[PathBuf]) -> usize {
    let mut ingested = 0usize;
    for root in roots {
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.to_string_lossy().into_owned());
        let project_id = library.ensure_project(&name, Some(root));

        let walker = WalkBuilder::new(root).hidden(true).build();
        for entry in walker.filter_map(|e| e.ok()) {
            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }
            let Some((file_name, rel_path, taken_at, size, kind)) =
                record_fields(root, entry.path())
            else {
                continue;
            };
            if library
                .ingest(project_id, &file_name, &rel_path, taken_at, size, kind)
                .is_some()
            {
                ingested += 1;
            }
        }
        tracing::info!("scanned photo root {:?} as project {}", root, project_id);
    }
    ingested
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_tmp_dir(tag: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("vcp-gallery-{}-{}", tag, nanos))
    }

    #[test]
    fn scan_picks_up_media_files_only() {
        let root = unique_tmp_dir("scan");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("a.jpg"), b"jpeg").unwrap();
        std::fs::write(root.join("b.mp4"), b"mp4").unwrap();
        std::fs::write(root.join("notes.txt"), b"txt").unwrap();

        let lib = PhotoLibrary::new();
        let n = scan_roots(&lib, &[root.clone()]);
        assert_eq!(n, 2);
        assert_eq!(lib.photo_count(), 2);

        // 重扫幂等
        assert_eq!(scan_roots(&lib, &[root.clone()]), 0);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn timestamp_string_sorts_lexicographically() {
        let early = timestamp_string(std::time::UNIX_EPOCH);
        let late = timestamp_string(SystemTime::now());
        assert!(early < late);
    }
}
