//! KeySource port - 処理待ちの Key を保持する set（Redis または InMemory）
//!
//! # 実装
//! - **RedisKeySource**: SMEMBERS / SREM（本番用）
//! - **InMemoryKeySource**: テスト・開発用

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Key;

/// KeySource 操作のエラー
#[derive(Debug, Error)]
pub enum KeySourceError {
    /// 接続できない、途中で切れた、タイムアウトした
    #[error("key source connection failed: {0}")]
    Connection(String),

    /// コマンド自体が失敗した（型違いの key、認証エラーなど）
    #[error("key source command failed: {0}")]
    Command(String),
}

/// KeySource は名前付き set のメンバーを読み書きする
///
/// # 設計原則
/// - `members` はその時点のスナップショットを返す（順序は実装依存だが、返した Vec の順序は固定）
/// - `remove_members` は与えた key だけを 1 回の操作で取り除く
/// - 部分成功は通知しない（Redis の SREM は原子的）
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn members(&self, set: &str) -> Result<Vec<Key>, KeySourceError>;

    /// 取り除いた件数を返す（既に無かった key は数えない）
    async fn remove_members(&self, set: &str, keys: &[Key]) -> Result<usize, KeySourceError>;
}
