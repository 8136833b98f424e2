//! Document - Document Store に保存されたドキュメント
//!
//! ドキュメントは「フィールド名 → 値」のマップです。
//! reconciler が気にするのは expire field（timestamp）1 つだけで、
//! それ以外のフィールドは不透明なまま保持します。

use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;

use super::key::Key;

/// 緯度経度
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// FieldValue はドキュメントの 1 フィールドの値
///
/// Firestore の値型に対応していますが、ワイヤ形式には依存しません。
/// 変換は各アダプタ（impls::firestore など）の責務です。
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Timestamp(DateTime<Utc>),
    String(String),
    Bytes(Vec<u8>),
    Reference(String),
    GeoPoint(GeoPoint),
    Array(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// timestamp 型であれば値を返す
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

/// "未設定" とみなす timestamp かどうか
///
/// Unix epoch と、Go の `time.Time{}` が書き込む `0001-01-01T00:00:00Z` の 2 つ。
pub fn is_zero_timestamp(ts: &DateTime<Utc>) -> bool {
    if ts.timestamp() == 0 && ts.timestamp_subsec_nanos() == 0 {
        return true;
    }
    matches!(
        Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).single(),
        Some(zero) if zero == *ts
    )
}

/// Document は Key で識別されるフィールドの集合
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub key: Key,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Document {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            fields: BTreeMap::new(),
        }
    }

    /// フィールドを追加（builder 風に使える）
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// expire field の現在値（timestamp かつ非ゼロのときだけ）
    ///
    /// フィールドが無い、timestamp 以外の型、ゼロ値のいずれかなら `None`。
    pub fn expiry(&self, field: &str) -> Option<DateTime<Utc>> {
        self.get(field)
            .and_then(FieldValue::as_timestamp)
            .filter(|ts| !is_zero_timestamp(ts))
    }
}
