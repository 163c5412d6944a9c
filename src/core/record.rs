use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// 媒体类型（按扩展名判定，大小写不敏感）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "heic" | "heif" | "tif" | "tiff" | "bmp"
            | "avif" | "dng" | "raw" | "cr2" | "nef" | "arw" => Some(MediaKind::Photo),
            "mp4" | "mov" | "avi" | "mkv" | "webm" | "m4v" | "mts" => Some(MediaKind::Video),
            _ => None,
        }
    }
}

/// 照片记录：分页窗口的基本单元。
///
/// - `id` 单调唯一，充当排序 tie-break（keyset 分页的正确性支点）
/// - `taken_at` 走 RFC3339 风格字符串，字典序 == 时间序，可直接进 cursor
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub id: i64,
    pub project_id: i64,
    pub file_name: String,
    pub rel_path: String,
    /// 拍摄/修改时间；扫描不到元数据时为 None（排序时落在最旧端）
    pub taken_at: Option<String>,
    pub size: u64,
    pub kind: MediaKind,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl PhotoRecord {
    /// 去重身份键：`project::文件名`（NFC 归一，防止 macOS NFD 路径造成假重复）。
    /// 只用于去重，绝不参与排序。
    pub fn identity_key(&self) -> String {
        identity_key(self.project_id, &self.file_name)
    }
}

pub fn identity_key(project_id: i64, file_name: &str) -> String {
    let normalized: String = file_name.nfc().collect();
    format!("{}::{}", project_id, normalized)
}

/// locate 响应里的目标摘要（不回传整条记录的冗余字段）
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordSummary {
    pub id: i64,
    pub project_id: i64,
    pub file_name: String,
    pub taken_at: Option<String>,
}

impl From<&PhotoRecord> for RecordSummary {
    fn from(rec: &PhotoRecord) -> Self {
        Self {
            id: rec.id,
            project_id: rec.project_id,
            file_name: rec.file_name.clone(),
            taken_at: rec.taken_at.clone(),
        }
    }
}

/// 项目（父集合）。归档项目在 union 视图里被整体排除。
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub archived: bool,
}
