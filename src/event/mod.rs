pub mod watcher;

use serde::{Deserialize, Serialize};

use crate::core::record::PhotoRecord;

pub use watcher::LibraryWatcher;

/// 库变更事件：PhotoLibrary 的每次结构/字段变更广播一条。
///
/// 客户端窗口对 Insert/Remove/Update 走 `window::delta::apply_delta`；
/// 过滤器语义可能受影响的变更（例如项目归档）直接 reset 窗口。
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    Insert(PhotoRecord),
    Remove {
        key: String,
    },
    /// 字段级更新：不改变记录在排序里的位置（taken_at/id 不可变）
    Update {
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        favorite: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tags: Option<Vec<String>>,
    },
}

impl ChangeEvent {
    /// 事件指向的身份键（Insert 从记录上取）。
    pub fn key(&self) -> String {
        match self {
            ChangeEvent::Insert(rec) => rec.identity_key(),
            ChangeEvent::Remove { key } => key.clone(),
            ChangeEvent::Update { key, .. } => key.clone(),
        }
    }
}
