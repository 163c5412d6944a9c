use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::core::filter::{FileTypeFilter, GalleryFilter};
use crate::core::order::{SortDirection, SortField};
use crate::index::library::{GalleryError, PhotoLibrary};
use crate::query::cursor::PageCursor;
use crate::stats::{read_process_rss, LibraryStats};

/// HTTP 查询服务：分页窗口的 §6 外部边界。
pub struct QueryServer {
    pub library: Arc<PhotoLibrary>,
}

impl QueryServer {
    pub fn new(library: Arc<PhotoLibrary>) -> Self {
        Self { library }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/photos", get(photos_handler))
            .route("/photos/locate", get(locate_handler))
            .route("/status", get(status_handler))
            .with_state(self.library.clone())
    }

    pub async fn run(self, port: u16) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
        tracing::info!("HTTP query server listening on port {}", port);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    /// 测试/嵌入场景：绑在调用方给的 listener 上（如 127.0.0.1:0）。
    pub async fn run_on(self, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

/// /photos 的 query string。过滤字段直接铺开——serde_urlencoded
/// 不吃 flatten（铺开的内层非字符串字段会解析失败），也不支持重复键
/// 展开成 Vec，所以 `projects` 是逗号分隔 id 列表。
#[derive(Debug, Default, Deserialize)]
pub struct PhotosParams {
    pub cursor: Option<String>,
    pub before_cursor: Option<String>,
    pub limit: Option<usize>,
    pub projects: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub file_type: Option<FileTypeFilter>,
    pub favorite_only: Option<bool>,
    pub tag: Option<String>,
    pub exclude_tag: Option<String>,
    pub name_glob: Option<String>,
    pub sort_field: Option<SortField>,
    pub direction: Option<SortDirection>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LocateParams {
    /// 目标文件名（basename）
    pub file: String,
    /// 限定父项目；缺省时在整个 scope 里找第一个同名
    pub project: Option<i64>,
    pub limit: Option<usize>,
    pub projects: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub file_type: Option<FileTypeFilter>,
    pub favorite_only: Option<bool>,
    pub tag: Option<String>,
    pub exclude_tag: Option<String>,
    pub name_glob: Option<String>,
    pub sort_field: Option<SortField>,
    pub direction: Option<SortDirection>,
}

fn parse_projects(raw: Option<String>) -> Vec<i64> {
    raw.map(|raw| {
        raw.split(',')
            .filter_map(|p| p.trim().parse::<i64>().ok())
            .collect()
    })
    .unwrap_or_default()
}

impl PhotosParams {
    fn into_filter(self) -> GalleryFilter {
        GalleryFilter {
            projects: parse_projects(self.projects),
            date_from: self.date_from,
            date_to: self.date_to,
            file_type: self.file_type.unwrap_or_default(),
            favorite_only: self.favorite_only.unwrap_or(false),
            tag: self.tag,
            exclude_tag: self.exclude_tag,
            name_glob: self.name_glob,
            sort_field: self.sort_field.unwrap_or_default(),
            direction: self.direction.unwrap_or_default(),
        }
    }
}

impl LocateParams {
    fn into_filter(self) -> GalleryFilter {
        GalleryFilter {
            projects: parse_projects(self.projects),
            date_from: self.date_from,
            date_to: self.date_to,
            file_type: self.file_type.unwrap_or_default(),
            favorite_only: self.favorite_only.unwrap_or(false),
            tag: self.tag,
            exclude_tag: self.exclude_tag,
            name_glob: self.name_glob,
            sort_field: self.sort_field.unwrap_or_default(),
            direction: self.direction.unwrap_or_default(),
        }
    }
}

/// 类型化错误 → HTTP 状态码。NotFound 必须是可区分的 404，
/// 绝不能用 200 + 空 items 冒充。
fn error_response(err: GalleryError) -> Response {
    let status = match &err {
        GalleryError::NotFound(_) => StatusCode::NOT_FOUND,
        GalleryError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
    };
    (status, Json(serde_json::json!({ "error": err.to_string() }))).into_response()
}

async fn photos_handler(
    Query(params): Query<PhotosParams>,
    State(library): State<Arc<PhotoLibrary>>,
) -> Response {
    // 坏 cursor 按“无 cursor”处理：导航从第一页重来，而不是 500
    let cursor = PageCursor::decode_lenient(params.cursor.as_deref());
    let before = PageCursor::decode_lenient(params.before_cursor.as_deref());
    let limit = params.limit;
    let filter = params.into_filter();

    match library.fetch_page(&filter, cursor, before, limit) {
        Ok(page) => Json(page).into_response(),
        Err(err) => error_response(err),
    }
}

async fn locate_handler(
    Query(params): Query<LocateParams>,
    State(library): State<Arc<PhotoLibrary>>,
) -> Response {
    let file = params.file.clone();
    let project = params.project;
    let limit = params.limit;
    let filter = params.into_filter();
    match library.locate(project, &file, &filter, limit) {
        Ok(found) => Json(found).into_response(),
        Err(err) => error_response(err),
    }
}

async fn status_handler(State(library): State<Arc<PhotoLibrary>>) -> Json<LibraryStats> {
    Json(LibraryStats {
        photos: library.photo_count(),
        projects: library.project_count(),
        process_rss_bytes: read_process_rss(),
    })
}
