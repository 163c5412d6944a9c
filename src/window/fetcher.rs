use std::sync::Arc;

use thiserror::Error;

use crate::core::filter::GalleryFilter;
use crate::index::library::{GalleryError, PhotoLibrary};
use crate::query::cursor::PageCursor;
use crate::query::page::PhotoPage;

/// 取一页的参数。`cursor`/`before_cursor` 最多设一个；都不设 == 第一页。
#[derive(Clone, Debug, Default)]
pub struct FetchRequest {
    pub cursor: Option<String>,
    pub before_cursor: Option<String>,
    pub limit: usize,
    pub filters: GalleryFilter,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Gallery(#[from] GalleryError),
    /// 传输层失败（HTTP fetcher 等远端实现用）。原样上抛，窗口不吞。
    #[error("transport: {0}")]
    Transport(String),
}

/// “取一页”抽象：窗口只负责排程调用，不做重试/退避/超时——
/// 那些归 fetcher 背后的网络层管。实现方可以是进程内直查，也可以是 HTTP。
pub trait PageFetcher: Send + Sync {
    fn fetch(
        &self,
        req: FetchRequest,
    ) -> impl std::future::Future<Output = Result<PhotoPage, FetchError>> + Send;
}

/// 进程内实现：直查 PhotoLibrary。
/// cursor 解码失败按“无 cursor”处理（从第一页重来），与 HTTP 层同一语义。
#[derive(Clone)]
pub struct LibraryFetcher {
    library: Arc<PhotoLibrary>,
}

impl LibraryFetcher {
    pub fn new(library: Arc<PhotoLibrary>) -> Self {
        Self { library }
    }
}

impl PageFetcher for LibraryFetcher {
    async fn fetch(&self, req: FetchRequest) -> Result<PhotoPage, FetchError> {
        let cursor = PageCursor::decode_lenient(req.cursor.as_deref());
        let before = PageCursor::decode_lenient(req.before_cursor.as_deref());
        Ok(self
            .library
            .fetch_page(&req.filters, cursor, before, Some(req.limit))?)
    }
}
