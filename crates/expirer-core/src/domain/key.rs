//! Key - Key Source に積まれた識別子
//!
//! Key は Redis set のメンバーであり、同時に Firestore のドキュメント ID です。
//! 中身は不透明な文字列として扱い、空文字列だけを拒否します。

use serde::{Deserialize, Serialize};
use std::fmt;

/// Key は処理対象ドキュメントの識別子
///
/// # 不変条件
/// - 空文字列ではない
/// - 重複排除は Key Source 側の set セマンティクスに任せる
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Key(String);

/// 空の Key を作ろうとしたときのエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("key must not be empty")]
pub struct EmptyKey;

impl Key {
    /// 文字列から Key を作成（空文字列は拒否）
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyKey> {
        let value = value.into();
        if value.is_empty() {
            return Err(EmptyKey);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for Key {
    type Error = EmptyKey;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Key {
    type Error = EmptyKey;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.0
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_rejected() {
        assert_eq!(Key::new(""), Err(EmptyKey));
    }

    #[test]
    fn key_displays_raw_value() {
        let key = Key::new("user:42").unwrap();
        assert_eq!(key.to_string(), "user:42");
        assert_eq!(key.as_str(), "user:42");
    }

    #[test]
    fn key_deserialization_rejects_empty_string() {
        let ok: Key = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(ok.as_str(), "abc");

        let err = serde_json::from_str::<Key>("\"\"");
        assert!(err.is_err());
    }
}
