//! Errors - 設定エラー
//!
//! store 由来のエラーは各 port（`ports::key_source`, `ports::document_store`）に、
//! run 全体のエラーは `app::error::ReconcileError` に置いています。

use thiserror::Error;

/// ConfigError は設定の欠落・不正
///
/// どの variant も store への I/O より前に返されます。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("key set name must not be empty")]
    EmptySetName,

    #[error("collection name must not be empty")]
    EmptyCollection,

    #[error("expire field name must not be empty")]
    EmptyExpireField,

    #[error("expire increment must be positive, got {0}")]
    NonPositiveIncrement(String),

    #[error("invalid duration: {0:?}")]
    InvalidDuration(String),

    #[error("invalid redis address {0:?}: expected host:port")]
    InvalidRedisAddr(String),
}
