use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 分页游标：`(sort_value, id)`。
///
/// 对调用方完全不透明——wire 上是 base64(JSON) 的自包含 token，不携带任何
/// 服务端会话状态。两个 cursor 只有在同一排序字段 + 方向下铸造才可比较；
/// codec 本身不校验这一点（由 WindowManager 的过滤器指纹把关）。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    #[serde(rename = "sortValue")]
    pub sort_value: Option<String>,
    pub id: i64,
}

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("cursor is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("cursor payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),
}

impl PageCursor {
    pub fn new(sort_value: Option<String>, id: i64) -> Self {
        Self { sort_value, id }
    }

    /// 编码成标准 base64（URL 安全性由解码端容错保证）。
    pub fn encode(&self) -> String {
        // serde_json 对这个结构不会失败
        let payload = serde_json::to_vec(self).expect("cursor payload serializes");
        STANDARD.encode(payload)
    }

    /// 解码。容忍不同传输层产出的变体：URL-safe 字母表、缺失 padding。
    /// 畸形输入返回 CursorError，绝不 panic——调用方按“cursor 不存在”处理。
    pub fn decode(token: &str) -> Result<Self, CursorError> {
        let token = token.trim();
        let bytes = STANDARD
            .decode(token)
            .or_else(|_| STANDARD_NO_PAD.decode(token))
            .or_else(|_| URL_SAFE.decode(token))
            .or_else(|_| URL_SAFE_NO_PAD.decode(token))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// HTTP 查询参数场景：解码失败降级为“无 cursor”（从第一页重来），只留 debug 日志。
    pub fn decode_lenient(token: Option<&str>) -> Option<Self> {
        let token = token?;
        match Self::decode(token) {
            Ok(cursor) => Some(cursor),
            Err(e) => {
                tracing::debug!("dropping undecodable cursor {:?}: {}", token, e);
                None
            }
        }
    }
}
