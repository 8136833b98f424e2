//! InMemoryDocumentStore - 開発・テスト用の Document Store
//!
//! Firestore の `Set(..., MergeAll)` と同じく、指定フィールドだけを上書きします。
//! 存在しないドキュメントへの `merge_update` は作成せずにエラーにします。

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::{Document, FieldValue, Key};
use crate::ports::{DocumentStore, DocumentStoreError};

#[derive(Default)]
struct State {
    /// (collection, key) -> fields
    docs: BTreeMap<(String, Key), BTreeMap<String, FieldValue>>,
    fail_get: BTreeSet<Key>,
    fail_update: BTreeSet<Key>,
    get_calls: Vec<Key>,
    update_calls: Vec<Key>,
}

/// InMemoryDocumentStore はコレクション単位でドキュメントを保持する
///
/// clone は同じ状態を共有します（テストから書き込み結果を確認するため）。
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// ドキュメントを丸ごと置く
    pub async fn insert(&self, collection: &str, doc: Document) {
        let mut state = self.state.lock().await;
        state
            .docs
            .insert((collection.to_string(), doc.key), doc.fields);
    }

    /// 現在のドキュメント（呼び出し記録には残らない）
    pub async fn peek(&self, collection: &str, key: &str) -> Option<Document> {
        let key = Key::new(key).ok()?;
        let state = self.state.lock().await;
        state
            .docs
            .get(&(collection.to_string(), key.clone()))
            .map(|fields| Document {
                key,
                fields: fields.clone(),
            })
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.docs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// この key の `get_document` を失敗させる
    pub async fn fail_get_for(&self, key: &str) {
        if let Ok(key) = Key::new(key) {
            self.state.lock().await.fail_get.insert(key);
        }
    }

    /// この key の `merge_update` を失敗させる
    pub async fn fail_update_for(&self, key: &str) {
        if let Ok(key) = Key::new(key) {
            self.state.lock().await.fail_update.insert(key);
        }
    }

    pub async fn get_calls(&self) -> Vec<Key> {
        self.state.lock().await.get_calls.clone()
    }

    pub async fn update_calls(&self) -> Vec<Key> {
        self.state.lock().await.update_calls.clone()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get_document(
        &self,
        collection: &str,
        key: &Key,
    ) -> Result<Document, DocumentStoreError> {
        let mut state = self.state.lock().await;
        state.get_calls.push(key.clone());
        if state.fail_get.contains(key) {
            return Err(DocumentStoreError::Store(format!(
                "injected get failure for {key}"
            )));
        }
        match state.docs.get(&(collection.to_string(), key.clone())) {
            Some(fields) => Ok(Document {
                key: key.clone(),
                fields: fields.clone(),
            }),
            None => Err(DocumentStoreError::NotFound {
                collection: collection.to_string(),
                key: key.clone(),
            }),
        }
    }

    async fn merge_update(
        &self,
        collection: &str,
        key: &Key,
        field: &str,
        value: FieldValue,
    ) -> Result<(), DocumentStoreError> {
        let mut state = self.state.lock().await;
        state.update_calls.push(key.clone());
        if state.fail_update.contains(key) {
            return Err(DocumentStoreError::Store(format!(
                "injected update failure for {key}"
            )));
        }
        let fields = state
            .docs
            .get_mut(&(collection.to_string(), key.clone()))
            .ok_or_else(|| {
                DocumentStoreError::Store(format!(
                    "precondition failed: {collection}/{key} does not exist"
                ))
            })?;
        fields.insert(field.to_string(), value);
        Ok(())
    }
}
