//! InMemoryKeySource - 開発・テスト用の Key Source
//!
//! # 学習ポイント
//! - `Arc<Mutex<..>>` で状態を共有し、clone したハンドルからテストが中身を覗ける
//! - 失敗注入（fail_members / fail_remove）で fail-fast 経路を再現する

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::Key;
use crate::ports::{KeySource, KeySourceError};

#[derive(Default)]
struct State {
    sets: BTreeMap<String, BTreeSet<Key>>,
    fail_members: bool,
    fail_remove: bool,
    members_calls: usize,
    remove_calls: Vec<Vec<Key>>,
}

/// InMemoryKeySource は set 名 → メンバー集合 を保持する
///
/// # 実装詳細
/// - メンバーは BTreeSet で持つので `members` はソート済みの順序を返す
/// - clone は同じ状態を共有する
///
/// # 使用例
/// ```ignore
/// let source = InMemoryKeySource::new();
/// source.add("pending", "a").await;
/// let keys = source.members("pending").await?;
/// ```
#[derive(Clone, Default)]
pub struct InMemoryKeySource {
    state: Arc<Mutex<State>>,
}

impl InMemoryKeySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// set に key を追加（空文字列は無視）
    pub async fn add(&self, set: &str, key: &str) {
        if let Ok(key) = Key::new(key) {
            let mut state = self.state.lock().await;
            state.sets.entry(set.to_string()).or_default().insert(key);
        }
    }

    /// set の現在の中身（ソート済み）
    pub async fn snapshot(&self, set: &str) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .sets
            .get(set)
            .map(|keys| keys.iter().map(|k| k.to_string()).collect())
            .unwrap_or_default()
    }

    /// 次回以降の `members` を失敗させる
    pub async fn fail_members(&self) {
        self.state.lock().await.fail_members = true;
    }

    /// 次回以降の `remove_members` を失敗させる
    pub async fn fail_remove(&self) {
        self.state.lock().await.fail_remove = true;
    }

    pub async fn members_calls(&self) -> usize {
        self.state.lock().await.members_calls
    }

    /// `remove_members` に渡された key（呼び出しごと）
    pub async fn remove_calls(&self) -> Vec<Vec<Key>> {
        self.state.lock().await.remove_calls.clone()
    }
}

#[async_trait]
impl KeySource for InMemoryKeySource {
    async fn members(&self, set: &str) -> Result<Vec<Key>, KeySourceError> {
        let mut state = self.state.lock().await;
        state.members_calls += 1;
        if state.fail_members {
            return Err(KeySourceError::Connection("injected members failure".into()));
        }
        Ok(state
            .sets
            .get(set)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn remove_members(&self, set: &str, keys: &[Key]) -> Result<usize, KeySourceError> {
        let mut state = self.state.lock().await;
        state.remove_calls.push(keys.to_vec());
        if state.fail_remove {
            return Err(KeySourceError::Command("injected remove failure".into()));
        }
        let Some(members) = state.sets.get_mut(set) else {
            return Ok(0);
        };
        let removed = keys.iter().filter(|k| members.remove(*k)).count();
        if members.is_empty() {
            state.sets.remove(set);
        }
        Ok(removed)
    }
}
