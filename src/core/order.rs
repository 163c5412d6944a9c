use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::core::record::PhotoRecord;

/// 主排序字段。无论选哪个，`id` 永远是第二键（tie-break）。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    TakenAt,
    FileName,
    Size,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn reversed(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// 一条记录在当前排序下的键：`(sort_value, id)`。
///
/// sort_value 统一成 Option<String>（cursor wire 格式也是 string|null）：
/// - taken_at 缺失 → None，排在所有有值记录之下（asc 最前 / desc 最后）
/// - size 零填充 20 位十进制，保证字典序 == 数值序
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub sort_value: Option<String>,
    pub id: i64,
}

impl SortKey {
    pub fn of(record: &PhotoRecord, field: SortField) -> Self {
        let sort_value = match field {
            SortField::TakenAt => record.taken_at.clone(),
            SortField::FileName => Some(record.file_name.clone()),
            SortField::Size => Some(format!("{:020}", record.size)),
        };
        Self {
            sort_value,
            id: record.id,
        }
    }

    /// 升序全序比较；None < Some(_)，同值比 id。
    fn cmp_asc(&self, other: &Self) -> Ordering {
        match (&self.sort_value, &other.sort_value) {
            (None, None) => self.id.cmp(&other.id),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => a.cmp(b).then_with(|| self.id.cmp(&other.id)),
        }
    }

    /// 扫描序比较：Less 表示 self 在 other 之前被扫到。
    /// desc 即升序取反（value 与 id 同向取反，保持全序）。
    pub fn cmp_scan(&self, other: &Self, direction: SortDirection) -> Ordering {
        match direction {
            SortDirection::Asc => self.cmp_asc(other),
            SortDirection::Desc => other.cmp_asc(self),
        }
    }
}

/// 按扫描序排序一批记录（稳定排序无所谓：键本身已全序）。
pub fn sort_records(records: &mut [PhotoRecord], field: SortField, direction: SortDirection) {
    records.sort_by(|a, b| SortKey::of(a, field).cmp_scan(&SortKey::of(b, field), direction));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::MediaKind;

    fn rec(id: i64, taken_at: Option<&str>) -> PhotoRecord {
        PhotoRecord {
            id,
            project_id: 1,
            file_name: format!("img_{id}.jpg"),
            rel_path: format!("img_{id}.jpg"),
            taken_at: taken_at.map(str::to_string),
            size: 100,
            kind: MediaKind::Photo,
            favorite: false,
            tags: vec![],
        }
    }

    #[test]
    fn desc_orders_newest_first_with_id_tiebreak() {
        let mut v = vec![
            rec(5, Some("2024-01-01")),
            rec(7, Some("2024-01-01")),
            rec(2, Some("2024-03-01")),
        ];
        sort_records(&mut v, SortField::TakenAt, SortDirection::Desc);
        let ids: Vec<i64> = v.iter().map(|r| r.id).collect();
        // 同日的 5 和 7：desc 下 id 大者在前
        assert_eq!(ids, vec![2, 7, 5]);
    }

    #[test]
    fn missing_sort_value_lands_at_oldest_end() {
        let mut v = vec![rec(1, None), rec(2, Some("2020-01-01"))];
        sort_records(&mut v, SortField::TakenAt, SortDirection::Desc);
        assert_eq!(v[0].id, 2);
        assert_eq!(v[1].id, 1);

        sort_records(&mut v, SortField::TakenAt, SortDirection::Asc);
        assert_eq!(v[0].id, 1);
    }

    #[test]
    fn scan_order_is_total_under_both_directions() {
        let a = SortKey {
            sort_value: Some("2024-01-01".into()),
            id: 5,
        };
        let b = SortKey {
            sort_value: Some("2024-01-01".into()),
            id: 7,
        };
        assert_eq!(a.cmp_scan(&b, SortDirection::Asc), Ordering::Less);
        assert_eq!(a.cmp_scan(&b, SortDirection::Desc), Ordering::Greater);
        assert_eq!(a.cmp_scan(&a, SortDirection::Desc), Ordering::Equal);
    }
}
