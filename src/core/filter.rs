use serde::{Deserialize, Serialize};
use wildmatch::WildMatch;
use xxhash_rust::xxh3::xxh3_64;

use crate::core::order::{SortDirection, SortField};
use crate::core::record::{MediaKind, PhotoRecord};

/// 指纹里混入布局版本：字段增删后旧指纹整体失效，避免跨版本误判“过滤器没变”。
const FILTER_LAYOUT_VERSION: u64 = 2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileTypeFilter {
    #[default]
    Any,
    Photo,
    Video,
}

/// 过滤/排序描述符：封闭字段集（不是开放 map），等价性由指纹定义。
///
/// 缺省字段 == 不过滤；序列化时跳过，保证同一语义只有一种编码。
/// cursor 只在同一份过滤器指纹的生命周期内有效。
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GalleryFilter {
    /// 限定项目集合；空 == 全部未归档项目（union 视图）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub projects: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
    #[serde(default)]
    pub file_type: FileTypeFilter,
    #[serde(default)]
    pub favorite_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_tag: Option<String>,
    /// 文件名通配（`*`/`?`），大小写敏感
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_glob: Option<String>,
    #[serde(default)]
    pub sort_field: SortField,
    #[serde(default)]
    pub direction: SortDirection,
}

impl GalleryFilter {
    /// 过滤器指纹：canonical JSON + 布局版本 → xxh3。
    /// WindowManager 用它检测“换了过滤器还在用旧 cursor”的调用方违约。
    pub fn fingerprint(&self) -> u64 {
        let canonical = serde_json::to_string(self).unwrap_or_default();
        xxh3_64(format!("v{FILTER_LAYOUT_VERSION}:{canonical}").as_bytes())
    }

    /// 记录级合取匹配。项目归档/scope 约束不在这里（需要项目表，见 query::predicate）。
    pub fn matches_record(&self, rec: &PhotoRecord) -> bool {
        match self.file_type {
            FileTypeFilter::Any => {}
            FileTypeFilter::Photo => {
                if rec.kind != MediaKind::Photo {
                    return false;
                }
            }
            FileTypeFilter::Video => {
                if rec.kind != MediaKind::Video {
                    return false;
                }
            }
        }

        if self.favorite_only && !rec.favorite {
            return false;
        }

        // 日期闭区间；taken_at 缺失的记录不落进任何日期过滤
        if let Some(from) = &self.date_from {
            match &rec.taken_at {
                Some(t) if t.as_str() >= from.as_str() => {}
                _ => return false,
            }
        }
        if let Some(to) = &self.date_to {
            match &rec.taken_at {
                // 闭区间上界：到 `to` 当天为止（字符串前缀日期比较）
                Some(t) if t.as_str() <= to.as_str() || t.starts_with(to.as_str()) => {}
                _ => return false,
            }
        }

        if let Some(tag) = &self.tag {
            if !rec.tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        if let Some(excluded) = &self.exclude_tag {
            if rec.tags.iter().any(|t| t == excluded) {
                return false;
            }
        }

        if let Some(glob) = &self.name_glob {
            if !WildMatch::new(glob).matches(&rec.file_name) {
                return false;
            }
        }

        true
    }
}
