//! DocumentStore port - ドキュメント DB（Firestore または InMemory）
//!
//! # 実装
//! - **FirestoreDocumentStore**: Firestore REST v1（本番用）
//! - **InMemoryDocumentStore**: テスト・開発用

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Document, FieldValue, Key};

/// DocumentStore 操作のエラー
///
/// `NotFound` だけは reconciler にとって正常系です。
#[derive(Debug, Error)]
pub enum DocumentStoreError {
    #[error("document {collection}/{key} not found")]
    NotFound { collection: String, key: Key },

    /// 認証・ネットワーク・quota など、それ以外すべて
    #[error("document store error: {0}")]
    Store(String),
}

impl DocumentStoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DocumentStoreError::NotFound { .. })
    }
}

/// DocumentStore は Key でドキュメントを読み、1 フィールドだけを部分更新する
///
/// # 設計原則
/// - `merge_update` は指定フィールド以外に触れない
/// - `merge_update` はドキュメントを新規作成しない
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document(&self, collection: &str, key: &Key)
    -> Result<Document, DocumentStoreError>;

    /// `fields` に挙げたフィールドだけを持つドキュメントを返す
    ///
    /// 既定では全体を読んでから絞る。リモートの store は読み込み自体を絞るとよい
    /// （関係ないフィールドの decode に失敗しても巻き込まれない）。
    async fn get_fields(
        &self,
        collection: &str,
        key: &Key,
        fields: &[&str],
    ) -> Result<Document, DocumentStoreError> {
        let mut doc = self.get_document(collection, key).await?;
        doc.fields.retain(|name, _| fields.contains(&name.as_str()));
        Ok(doc)
    }

    async fn merge_update(
        &self,
        collection: &str,
        key: &Key,
        field: &str,
        value: FieldValue,
    ) -> Result<(), DocumentStoreError>;
}
