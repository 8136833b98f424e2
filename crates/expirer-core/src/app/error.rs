//! ReconcileError - run を止めたエラー
//!
//! `NotFound` 以外の store エラーはすべてここに来ます。
//! どの key で止まったか、それまでに何件書き込んだかを保持するので、
//! 呼び出し側（CLI）は診断メッセージを組み立てられます。
//! 設定エラーは Reconciler の構築時に返るので、ここには来ません。

use thiserror::Error;

use crate::domain::Key;
use crate::ports::{DocumentStoreError, KeySourceError};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("reading key set {set:?}: {source}")]
    ReadKeys {
        set: String,
        #[source]
        source: KeySourceError,
    },

    /// key の取得で失敗（NotFound 以外）。`applied` はそれまでに書き込み済みの key
    #[error("fetching document {key}: {source}")]
    Fetch {
        key: Key,
        applied: Vec<Key>,
        #[source]
        source: DocumentStoreError,
    },

    /// key の書き込みで失敗。`applied` はそれまでに書き込み済みの key
    #[error("updating document {key}: {source}")]
    Write {
        key: Key,
        applied: Vec<Key>,
        #[source]
        source: DocumentStoreError,
    },

    /// 新しい expiry が timestamp の範囲を超えた
    #[error("expiry for {key} overflows the timestamp range")]
    ExpiryOverflow { key: Key, applied: Vec<Key> },

    /// ドキュメントは更新済みだが set からの削除に失敗（次回 run で再処理される）
    #[error("removing {} processed keys from {set:?}: {source}", .keys.len())]
    RemoveKeys {
        set: String,
        keys: Vec<Key>,
        #[source]
        source: KeySourceError,
    },
}

impl ReconcileError {
    /// 処理中に失敗した key（key 単位の失敗のときだけ）
    pub fn failed_key(&self) -> Option<&Key> {
        match self {
            ReconcileError::Fetch { key, .. }
            | ReconcileError::Write { key, .. }
            | ReconcileError::ExpiryOverflow { key, .. } => Some(key),
            _ => None,
        }
    }

    /// 失敗前に expire field を書き換えてしまった key
    ///
    /// これらは set に残ったままなので、次回 run で increment が二重にかかる。
    pub fn applied_keys(&self) -> &[Key] {
        match self {
            ReconcileError::Fetch { applied, .. }
            | ReconcileError::Write { applied, .. }
            | ReconcileError::ExpiryOverflow { applied, .. } => applied,
            ReconcileError::RemoveKeys { keys, .. } => keys,
            ReconcileError::ReadKeys { .. } => &[],
        }
    }
}
