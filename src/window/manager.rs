use std::collections::{HashSet, VecDeque};

use crate::core::filter::GalleryFilter;
use crate::core::record::PhotoRecord;
use crate::window::fetcher::{FetchError, FetchRequest, PageFetcher};

/// 空页（或去重后全重复）时沿 cursor 链推进的重试上限。
/// 用完不算错误：本轮没有可区分的新数据，调用方稍后可再试。
pub const EMPTY_PAGE_RETRIES: usize = 3;

/// 淘汰策略参数。守卫的存在理由：淘汰过猛会让窗口撑不住随后的
/// deep-link 跳转（刚跳进来的页立刻被挤掉）。
#[derive(Clone, Copy, Debug)]
pub struct WindowConfig {
    /// 超过该页数才触发淘汰
    pub max_pages: usize,
    /// 页数低于 3 一律不淘汰
    pub min_pages: usize,
    /// 缓冲条目总数低于此值不淘汰
    pub min_window_items: usize,
    /// 从头部淘汰时：尾页小于此值先缓一缓
    pub small_tail_floor: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            max_pages: 6,
            min_pages: 3,
            min_window_items: 120,
            small_tail_floor: 8,
        }
    }
}

/// 一次 load 调用的类型化结果。重试上限和语义集中在一处，
/// 不散落在各调用点的 ad hoc 循环里。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// 新进窗口的条目数（去重后）
    Loaded(usize),
    /// 服务端宣告该方向没有更多数据（cursor 为 null）
    NoMore,
    /// 重试额度内只碰到空切片；不是终点，稍后可再试
    Exhausted,
    /// 同方向已有调用在途，本次被丢弃（不排队）
    Busy,
    /// 过滤器指纹与 load_initial 时不符：调用方违约，拒绝混用谓词
    StaleFilters,
    /// await 期间窗口被 reset/重建，结果作废，未触碰状态
    Superseded,
}

/// 窗口内缓存的一页：去重后的条目 + 原始页的两端 cursor。
#[derive(Clone, Debug)]
pub(crate) struct CachedPage {
    pub(crate) items: Vec<PhotoRecord>,
    pub(crate) prev_cursor: Option<String>,
    pub(crate) next_cursor: Option<String>,
}

/// 有界双向分页窗口。
///
/// 持有一段连续已加载页、对外的 head/tail cursor、按身份键的去重集。
/// 状态机：empty → loaded →（淘汰中）→ …；reset 回到 empty，无终态。
/// 一个实例绑定一份过滤器/scope；要并行两个滚动位置就建两个实例，
/// 跨 scope 共用同一实例是明确禁止的（cursor 是 scope 绑定的）。
pub struct PhotoWindow<F: PageFetcher> {
    fetcher: F,
    config: WindowConfig,
    limit: usize,
    filters: GalleryFilter,
    fingerprint: u64,
    pub(crate) pages: VecDeque<CachedPage>,
    pub(crate) seen: HashSet<String>,
    pub(crate) head_prev: Option<String>,
    pub(crate) tail_next: Option<String>,
    /// 状态代际：reset/load_initial 递增。在途调用落地前核对代际，
    /// 代际不符的结果整体作废——被放弃的 fetch 即使最终 resolve
    /// 也不会污染新状态。
    generation: u64,
    pub(crate) next_in_flight: bool,
    pub(crate) prev_in_flight: bool,
    evictions_total: u64,
    empty_retries_total: u64,
}

impl<F: PageFetcher> PhotoWindow<F> {
    pub fn new(fetcher: F, filters: GalleryFilter, limit: usize, config: WindowConfig) -> Self {
        let fingerprint = filters.fingerprint();
        Self {
            fetcher,
            config,
            limit,
            filters,
            fingerprint,
            pages: VecDeque::new(),
            seen: HashSet::new(),
            head_prev: None,
            tail_next: None,
            generation: 0,
            next_in_flight: false,
            prev_in_flight: false,
            evictions_total: 0,
            empty_retries_total: 0,
        }
    }

    // ─── 只读视图 ───

    pub fn filters(&self) -> &GalleryFilter {
        &self.filters
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn total_items(&self) -> usize {
        self.pages.iter().map(|p| p.items.len()).sum()
    }

    /// 平铺视图：按扫描序串接所有缓存页。
    pub fn items(&self) -> impl Iterator<Item = &PhotoRecord> {
        self.pages.iter().flat_map(|p| p.items.iter())
    }

    pub fn head_prev_cursor(&self) -> Option<&str> {
        self.head_prev.as_deref()
    }

    pub fn tail_next_cursor(&self) -> Option<&str> {
        self.tail_next.as_deref()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    pub fn evictions_total(&self) -> u64 {
        self.evictions_total
    }

    pub fn empty_retries_total(&self) -> u64 {
        self.empty_retries_total
    }

    pub fn stats(&self) -> crate::stats::WindowStats {
        crate::stats::WindowStats {
            pages: self.pages.len(),
            items: self.total_items(),
            dedup_keys: self.seen.len(),
            evictions_total: self.evictions_total,
            empty_retries_total: self.empty_retries_total,
        }
    }

    // ─── 生命周期 ───

    /// 清空并回到 empty。代际递增，在途调用全部作废。
    pub fn reset(&mut self) {
        self.generation += 1;
        self.pages.clear();
        self.seen.clear();
        self.head_prev = None;
        self.tail_next = None;
        self.next_in_flight = false;
        self.prev_in_flight = false;
    }

    /// 换一份过滤器重开窗口（cursor 是 scope 绑定的，必须从头来）。
    pub fn reset_with_filters(&mut self, filters: GalleryFilter) {
        self.fingerprint = filters.fingerprint();
        self.filters = filters;
        self.reset();
    }

    /// 清状态 → 无 cursor 取第一页 → 用该页的两端 cursor 播种 head/tail。
    /// 单页结果由此自然得到两端边界；空库则两端皆 null。
    pub async fn load_initial(&mut self) -> Result<LoadOutcome, FetchError> {
        self.reset();
        let gen = self.generation;

        let page = self
            .fetcher
            .fetch(FetchRequest {
                cursor: None,
                before_cursor: None,
                limit: self.limit,
                filters: self.filters.clone(),
            })
            .await?;
        if self.generation != gen {
            return Ok(LoadOutcome::Superseded);
        }

        let fresh: Vec<PhotoRecord> = page
            .items
            .into_iter()
            .filter(|r| self.seen.insert(r.identity_key()))
            .collect();
        let loaded = fresh.len();
        self.head_prev = page.prev_cursor.clone();
        self.tail_next = page.next_cursor.clone();
        self.pages.push_back(CachedPage {
            items: fresh,
            prev_cursor: page.prev_cursor,
            next_cursor: page.next_cursor,
        });
        Ok(LoadOutcome::Loaded(loaded))
    }

    /// 指纹核对：load_next/load_prev 带着与 load_initial 不同的过滤器
    /// 属于调用方违约——记日志并拒绝，绝不混用新旧谓词。
    fn check_filters(&self, filters: &GalleryFilter) -> bool {
        if filters.fingerprint() != self.fingerprint {
            tracing::warn!(
                "filter fingerprint mismatch on paged load; caller must reset the window \
                 before changing filters"
            );
            return false;
        }
        true
    }

    /// 向尾部追加一页。
    ///
    /// 去重后为空的页不代表到头：底层集合在两次调用间可能变过。
    /// 只要返回的 next_cursor 非 null 就顺着链推进重试（有界）；
    /// next_cursor 为 null 才是服务端宣告“没有更多”。
    pub async fn load_next(&mut self, filters: &GalleryFilter) -> Result<LoadOutcome, FetchError> {
        if !self.check_filters(filters) {
            return Ok(LoadOutcome::StaleFilters);
        }
        if self.next_in_flight {
            return Ok(LoadOutcome::Busy);
        }
        let Some(mut cursor) = self.tail_next.clone() else {
            return Ok(LoadOutcome::NoMore);
        };

        self.next_in_flight = true;
        let gen = self.generation;

        for attempt in 0..EMPTY_PAGE_RETRIES {
            let result = self
                .fetcher
                .fetch(FetchRequest {
                    cursor: Some(cursor.clone()),
                    before_cursor: None,
                    limit: self.limit,
                    filters: self.filters.clone(),
                })
                .await;
            if self.generation != gen {
                // reset 已清走守卫；这里不再触碰任何状态
                return Ok(LoadOutcome::Superseded);
            }
            let page = match result {
                Ok(page) => page,
                Err(e) => {
                    // 失败不改状态：没有半页会被追加，tail 原地保留
                    self.next_in_flight = false;
                    return Err(e);
                }
            };

            let fresh: Vec<PhotoRecord> = page
                .items
                .into_iter()
                .filter(|r| self.seen.insert(r.identity_key()))
                .collect();

            if fresh.is_empty() {
                match page.next_cursor {
                    None => {
                        if let Some(last) = self.pages.back_mut() {
                            last.next_cursor = None;
                        }
                        self.tail_next = None;
                        self.next_in_flight = false;
                        return Ok(LoadOutcome::NoMore);
                    }
                    Some(next) => {
                        // 空切片但链未断：推进 cursor 再试。
                        // 尾页的边界 cursor 同步推进，tail 与末页保持相等
                        self.empty_retries_total += 1;
                        if let Some(last) = self.pages.back_mut() {
                            last.next_cursor = Some(next.clone());
                        }
                        self.tail_next = Some(next.clone());
                        cursor = next;
                        tracing::debug!("empty slice on load_next, retry {}", attempt + 1);
                        continue;
                    }
                }
            }

            let loaded = fresh.len();
            self.tail_next = page.next_cursor.clone();
            self.pages.push_back(CachedPage {
                items: fresh,
                prev_cursor: page.prev_cursor,
                next_cursor: page.next_cursor,
            });
            self.evict_from_head();
            self.next_in_flight = false;
            return Ok(LoadOutcome::Loaded(loaded));
        }

        self.next_in_flight = false;
        Ok(LoadOutcome::Exhausted)
    }

    /// 向头部前插一页；与 load_next 对称，但淘汰发生在尾部，
    /// 且成功后 tail_next 必须从“当前最后一页”重算——窗口先前被
    /// 尾部截断过的话，“最后一页”本身都可能换了。
    pub async fn load_prev(&mut self, filters: &GalleryFilter) -> Result<LoadOutcome, FetchError> {
        if !self.check_filters(filters) {
            return Ok(LoadOutcome::StaleFilters);
        }
        if self.prev_in_flight {
            return Ok(LoadOutcome::Busy);
        }
        let Some(mut cursor) = self.head_prev.clone() else {
            return Ok(LoadOutcome::NoMore);
        };

        self.prev_in_flight = true;
        let gen = self.generation;

        for attempt in 0..EMPTY_PAGE_RETRIES {
            let result = self
                .fetcher
                .fetch(FetchRequest {
                    cursor: None,
                    before_cursor: Some(cursor.clone()),
                    limit: self.limit,
                    filters: self.filters.clone(),
                })
                .await;
            if self.generation != gen {
                return Ok(LoadOutcome::Superseded);
            }
            let page = match result {
                Ok(page) => page,
                Err(e) => {
                    self.prev_in_flight = false;
                    return Err(e);
                }
            };

            let fresh: Vec<PhotoRecord> = page
                .items
                .into_iter()
                .filter(|r| self.seen.insert(r.identity_key()))
                .collect();

            if fresh.is_empty() {
                match page.prev_cursor {
                    None => {
                        if let Some(first) = self.pages.front_mut() {
                            first.prev_cursor = None;
                        }
                        self.head_prev = None;
                        self.prev_in_flight = false;
                        return Ok(LoadOutcome::NoMore);
                    }
                    Some(prev) => {
                        self.empty_retries_total += 1;
                        if let Some(first) = self.pages.front_mut() {
                            first.prev_cursor = Some(prev.clone());
                        }
                        self.head_prev = Some(prev.clone());
                        cursor = prev;
                        tracing::debug!("empty slice on load_prev, retry {}", attempt + 1);
                        continue;
                    }
                }
            }

            let loaded = fresh.len();
            self.head_prev = page.prev_cursor.clone();
            self.pages.push_front(CachedPage {
                items: fresh,
                prev_cursor: page.prev_cursor,
                next_cursor: page.next_cursor,
            });
            // 反向加载可能改变“最后一页”是谁：tail 从现状重算
            self.tail_next = self.pages.back().and_then(|p| p.next_cursor.clone());
            self.evict_from_tail();
            self.prev_in_flight = false;
            return Ok(LoadOutcome::Loaded(loaded));
        }

        self.prev_in_flight = false;
        Ok(LoadOutcome::Exhausted)
    }

    // ─── 淘汰 ───
    //
    // 淘汰只删缓存条目，不削可达性：被淘汰页的前驱区域仍可用新的
    // before_cursor 查询取回，所以 head_prev 从新首页重算而不是清空。

    fn evict_from_head(&mut self) {
        while self.pages.len() > self.config.max_pages {
            if self.pages.len() < self.config.min_pages {
                break;
            }
            if self.total_items() < self.config.min_window_items {
                break;
            }
            let tail_len = self.pages.back().map(|p| p.items.len()).unwrap_or(0);
            if tail_len < self.config.small_tail_floor {
                break;
            }
            if let Some(evicted) = self.pages.pop_front() {
                for item in &evicted.items {
                    self.seen.remove(&item.identity_key());
                }
                self.evictions_total += 1;
            }
            self.head_prev = self.pages.front().and_then(|p| p.prev_cursor.clone());
        }
    }

    fn evict_from_tail(&mut self) {
        while self.pages.len() > self.config.max_pages {
            if self.pages.len() < self.config.min_pages {
                break;
            }
            if self.total_items() < self.config.min_window_items {
                break;
            }
            if let Some(evicted) = self.pages.pop_back() {
                for item in &evicted.items {
                    self.seen.remove(&item.identity_key());
                }
                self.evictions_total += 1;
            }
            self.tail_next = self.pages.back().and_then(|p| p.next_cursor.clone());
        }
    }

    /// 不变式自检（测试用）：head/tail cursor 与首尾页一致，
    /// 去重集与缓存条目一一对应。
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        let front_prev = self.pages.front().and_then(|p| p.prev_cursor.clone());
        let back_next = self.pages.back().and_then(|p| p.next_cursor.clone());
        if !self.pages.is_empty() {
            assert_eq!(self.head_prev, front_prev);
            assert_eq!(self.tail_next, back_next);
        }
        let keys: HashSet<String> = self.items().map(|r| r.identity_key()).collect();
        assert_eq!(keys, self.seen);
        assert_eq!(keys.len(), self.total_items());
    }
}
