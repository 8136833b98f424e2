//! ReconcilerConfig - 1 回の run を決める不変の設定
//!
//! グローバルな flag / 環境変数を直接読まず、CLI が組み立てた値を
//! Reconciler の構築時に渡します。

use chrono::TimeDelta;

use super::errors::ConfigError;

/// ReconcilerConfig は reconciler の入力
///
/// # 検証（`validate`）
/// - 名前はすべて非空
/// - increment は正
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Key Source 上の set 名（Redis の key）
    pub key_set: String,
    /// Document Store のコレクション名
    pub collection: String,
    /// 読み書きする timestamp フィールド名
    pub expire_field: String,
    /// expire field に足す量
    pub increment: TimeDelta,
}

impl ReconcilerConfig {
    pub fn new(
        key_set: impl Into<String>,
        collection: impl Into<String>,
        expire_field: impl Into<String>,
        increment: TimeDelta,
    ) -> Self {
        Self {
            key_set: key_set.into(),
            collection: collection.into(),
            expire_field: expire_field.into(),
            increment,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_set.is_empty() {
            return Err(ConfigError::EmptySetName);
        }
        if self.collection.is_empty() {
            return Err(ConfigError::EmptyCollection);
        }
        if self.expire_field.is_empty() {
            return Err(ConfigError::EmptyExpireField);
        }
        if self.increment <= TimeDelta::zero() {
            return Err(ConfigError::NonPositiveIncrement(self.increment.to_string()));
        }
        Ok(())
    }
}
