use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::query::page::DEFAULT_PAGE_LIMIT;

/// 运行配置：`~/.config/vcp-gallery/config.toml`，CLI 参数可逐项覆盖。
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    /// 照片根目录（每个根成为一个项目）
    pub roots: Vec<PathBuf>,
    pub port: u16,
    pub page_limit: usize,
    pub max_window_pages: usize,
    /// fs 事件通道容量（满了丢弃并计数）
    pub event_channel_size: usize,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            port: 7060,
            page_limit: DEFAULT_PAGE_LIMIT,
            max_window_pages: 6,
            event_channel_size: 4096,
        }
    }
}

impl GalleryConfig {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("vcp-gallery").join("config.toml"))
    }

    /// 读不到或解析失败都回落默认值（带日志），不阻止启动。
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(raw) => match toml::from_str(&raw) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("ignoring malformed config {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }
}
