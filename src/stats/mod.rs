use std::fmt;

use serde::Serialize;

/// 库侧占用统计（/status 返回体）
#[derive(Clone, Debug, Default, Serialize)]
pub struct LibraryStats {
    pub photos: usize,
    pub projects: usize,
    pub process_rss_bytes: u64,
}

/// 窗口侧占用统计
#[derive(Clone, Debug, Default, Serialize)]
pub struct WindowStats {
    pub pages: usize,
    pub items: usize,
    pub dedup_keys: usize,
    pub evictions_total: u64,
    pub empty_retries_total: u64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct GalleryReport {
    pub library: LibraryStats,
    pub windows: Vec<WindowStats>,
}

/// 进程 RSS（/proc/self/statm 第二列，单位页）
pub fn read_process_rss() -> u64 {
    let Ok(statm) = std::fs::read_to_string("/proc/self/statm") else {
        return 0;
    };
    statm
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u64>().ok())
        .map(|pages| pages * 4096)
        .unwrap_or(0)
}

fn human_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 || unit == "GB" {
            return if unit == "B" {
                format!("{bytes} B")
            } else {
                format!("{value:.2} {unit}")
            };
        }
        value /= 1024.0;
    }
    unreachable!()
}

impl fmt::Display for GalleryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "┌─ vcp-gallery report ────────────────────────")?;
        writeln!(
            f,
            "│ library : {} photos / {} projects",
            self.library.photos, self.library.projects
        )?;
        writeln!(
            f,
            "│ rss     : {}",
            human_bytes(self.library.process_rss_bytes)
        )?;
        for (i, w) in self.windows.iter().enumerate() {
            writeln!(
                f,
                "│ window{} : {} pages / {} items / {} evicted / {} retries",
                i, w.pages, w.items, w.evictions_total, w.empty_retries_total
            )?;
        }
        write!(f, "└─────────────────────────────────────────────")
    }
}
