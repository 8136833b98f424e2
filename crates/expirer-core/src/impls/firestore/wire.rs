//! Firestore REST v1 の JSON 表現と domain 型の相互変換
//!
//! Firestore の `Value` は `{"stringValue": "x"}` のように、
//! 型名を key にした 1 要素オブジェクトです。serde の externally tagged enum と
//! 同じ形なので、そのまま derive で読み書きできます。

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{FieldValue, GeoPoint};

/// integer / double は文字列で来ることがある（int64 は常に文字列、double は NaN など）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum Number {
    Int(i64),
    Float(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct WireLatLng {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub(crate) struct WireArray {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<WireValue>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub(crate) struct WireMap {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, WireValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum WireValue {
    NullValue(()),
    BooleanValue(bool),
    IntegerValue(Number),
    DoubleValue(Number),
    TimestampValue(String),
    StringValue(String),
    BytesValue(String),
    ReferenceValue(String),
    GeoPointValue(WireLatLng),
    ArrayValue(WireArray),
    MapValue(WireMap),
}

/// GET documents/{path} のレスポンス
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireDocument {
    #[serde(default)]
    pub fields: BTreeMap<String, WireValue>,
}

/// PATCH のリクエストボディ
#[derive(Debug, Clone, Serialize)]
pub(crate) struct WritePatch {
    pub fields: BTreeMap<String, WireValue>,
}

/// エラーレスポンス `{"error": {"code": 404, "message": "...", "status": "NOT_FOUND"}}`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: ErrorStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorStatus {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: String,
}

fn number_to_i64(n: Number) -> Result<i64, String> {
    match n {
        Number::Int(i) => Ok(i),
        Number::Text(s) => s
            .parse()
            .map_err(|e| format!("integerValue {s:?}: {e}")),
        Number::Float(f) => Err(format!("integerValue {f} is not an integer")),
    }
}

fn number_to_f64(n: Number) -> Result<f64, String> {
    match n {
        Number::Int(i) => Ok(i as f64),
        Number::Float(f) => Ok(f),
        Number::Text(s) => match s.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            _ => s.parse().map_err(|e| format!("doubleValue {s:?}: {e}")),
        },
    }
}

fn f64_to_number(f: f64) -> Number {
    if f.is_nan() {
        Number::Text("NaN".into())
    } else if f == f64::INFINITY {
        Number::Text("Infinity".into())
    } else if f == f64::NEG_INFINITY {
        Number::Text("-Infinity".into())
    } else {
        Number::Float(f)
    }
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("timestampValue {raw:?}: {e}"))
}

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

impl WireValue {
    pub(crate) fn into_field(self) -> Result<FieldValue, String> {
        Ok(match self {
            WireValue::NullValue(()) => FieldValue::Null,
            WireValue::BooleanValue(b) => FieldValue::Boolean(b),
            WireValue::IntegerValue(n) => FieldValue::Integer(number_to_i64(n)?),
            WireValue::DoubleValue(n) => FieldValue::Double(number_to_f64(n)?),
            WireValue::TimestampValue(raw) => FieldValue::Timestamp(parse_timestamp(&raw)?),
            WireValue::StringValue(s) => FieldValue::String(s),
            WireValue::BytesValue(raw) => FieldValue::Bytes(
                STANDARD
                    .decode(raw.as_bytes())
                    .map_err(|e| format!("bytesValue: {e}"))?,
            ),
            WireValue::ReferenceValue(r) => FieldValue::Reference(r),
            WireValue::GeoPointValue(p) => FieldValue::GeoPoint(GeoPoint {
                latitude: p.latitude,
                longitude: p.longitude,
            }),
            WireValue::ArrayValue(a) => FieldValue::Array(
                a.values
                    .into_iter()
                    .map(WireValue::into_field)
                    .collect::<Result<_, _>>()?,
            ),
            WireValue::MapValue(m) => FieldValue::Map(decode_fields(m.fields)?),
        })
    }

    pub(crate) fn from_field(value: &FieldValue) -> Self {
        match value {
            FieldValue::Null => WireValue::NullValue(()),
            FieldValue::Boolean(b) => WireValue::BooleanValue(*b),
            FieldValue::Integer(i) => WireValue::IntegerValue(Number::Text(i.to_string())),
            FieldValue::Double(f) => WireValue::DoubleValue(f64_to_number(*f)),
            FieldValue::Timestamp(ts) => WireValue::TimestampValue(format_timestamp(ts)),
            FieldValue::String(s) => WireValue::StringValue(s.clone()),
            FieldValue::Bytes(b) => WireValue::BytesValue(STANDARD.encode(b)),
            FieldValue::Reference(r) => WireValue::ReferenceValue(r.clone()),
            FieldValue::GeoPoint(p) => WireValue::GeoPointValue(WireLatLng {
                latitude: p.latitude,
                longitude: p.longitude,
            }),
            FieldValue::Array(values) => WireValue::ArrayValue(WireArray {
                values: values.iter().map(WireValue::from_field).collect(),
            }),
            FieldValue::Map(fields) => WireValue::MapValue(WireMap {
                fields: fields
                    .iter()
                    .map(|(k, v)| (k.clone(), WireValue::from_field(v)))
                    .collect(),
            }),
        }
    }
}

pub(crate) fn decode_fields(
    fields: BTreeMap<String, WireValue>,
) -> Result<BTreeMap<String, FieldValue>, String> {
    fields
        .into_iter()
        .map(|(name, value)| {
            value
                .into_field()
                .map(|v| (name.clone(), v))
                .map_err(|e| format!("field {name:?}: {e}"))
        })
        .collect()
}

/// field path の 1 セグメントを Firestore の文法で表す
///
/// `[A-Za-z_][A-Za-z_0-9]*` 以外はバッククォートで囲み、`` ` `` と `\` をエスケープ。
pub(crate) fn quote_field_path(field: &str) -> String {
    let mut chars = field.chars();
    let simple = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        return field.to_string();
    }
    let mut quoted = String::with_capacity(field.len() + 2);
    quoted.push('`');
    for c in field.chars() {
        if c == '`' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('`');
    quoted
}
