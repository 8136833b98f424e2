//! ReconcilerBuilder - Reconciler の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 型パラメータを差し替える builder メソッド（clock）

use crate::domain::{ConfigError, ReconcilerConfig};
use crate::ports::{Clock, DocumentStore, KeySource, SystemClock};

use super::reconciler::Reconciler;

/// ReconcilerBuilder は Reconciler を構築
///
/// # 使用例
/// ```ignore
/// let reconciler = ReconcilerBuilder::new(config)
///     .key_source(RedisKeySource::connect(&endpoint).await?)
///     .document_store(FirestoreDocumentStore::new(firestore)?)
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - build() 時に設定を検証し、store 未設定もエラーにする
/// - clock を指定しなければ SystemClock
pub struct ReconcilerBuilder<K, D, C = SystemClock> {
    config: ReconcilerConfig,
    keys: Option<K>,
    docs: Option<D>,
    clock: C,
}

/// BuildError は Reconciler 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("key source was not set")]
    MissingKeySource,

    #[error("document store was not set")]
    MissingDocumentStore,
}

impl<K, D> ReconcilerBuilder<K, D, SystemClock> {
    /// 新しい ReconcilerBuilder を作成
    pub fn new(config: ReconcilerConfig) -> Self {
        Self {
            config,
            keys: None,
            docs: None,
            clock: SystemClock,
        }
    }
}

impl<K, D, C> ReconcilerBuilder<K, D, C> {
    pub fn key_source(mut self, keys: K) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn document_store(mut self, docs: D) -> Self {
        self.docs = Some(docs);
        self
    }

    /// 時刻の取得元を差し替える（テストでは FixedClock）
    pub fn clock<C2>(self, clock: C2) -> ReconcilerBuilder<K, D, C2> {
        ReconcilerBuilder {
            config: self.config,
            keys: self.keys,
            docs: self.docs,
            clock,
        }
    }
}

impl<K, D, C> ReconcilerBuilder<K, D, C>
where
    K: KeySource,
    D: DocumentStore,
    C: Clock,
{
    /// 検証して Reconciler を生成
    ///
    /// # 検証
    /// - 設定（名前が非空、increment が正）
    /// - key source / document store が設定済み
    pub fn build(self) -> Result<Reconciler<K, D, C>, BuildError> {
        self.config.validate()?;
        let keys = self.keys.ok_or(BuildError::MissingKeySource)?;
        let docs = self.docs.ok_or(BuildError::MissingDocumentStore)?;
        Ok(Reconciler::new(self.config, keys, docs, self.clock)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{InMemoryDocumentStore, InMemoryKeySource};
    use crate::ports::FixedClock;
    use chrono::{TimeDelta, TimeZone, Utc};

    type Builder = ReconcilerBuilder<InMemoryKeySource, InMemoryDocumentStore>;

    fn config() -> ReconcilerConfig {
        ReconcilerConfig::new("pending", "sessions", "expireAt", TimeDelta::hours(1))
    }

    #[test]
    fn test_build_success() {
        let reconciler = Builder::new(config())
            .key_source(InMemoryKeySource::new())
            .document_store(InMemoryDocumentStore::new())
            .build();
        assert!(reconciler.is_ok());
    }

    #[test]
    fn test_build_missing_stores() {
        let missing_keys = Builder::new(config())
            .document_store(InMemoryDocumentStore::new())
            .build();
        assert!(matches!(missing_keys, Err(BuildError::MissingKeySource)));

        let missing_docs = Builder::new(config())
            .key_source(InMemoryKeySource::new())
            .build();
        assert!(matches!(missing_docs, Err(BuildError::MissingDocumentStore)));
    }

    #[test]
    fn test_build_validates_config_first() {
        let bad = ReconcilerConfig {
            collection: String::new(),
            ..config()
        };
        let result = Builder::new(bad).build();
        assert!(matches!(
            result,
            Err(BuildError::Config(ConfigError::EmptyCollection))
        ));
    }

    #[tokio::test]
    async fn test_build_with_fixed_clock() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let keys = InMemoryKeySource::new();
        keys.add("pending", "a").await;
        let docs = InMemoryDocumentStore::new();
        docs.insert(
            "sessions",
            crate::domain::Document::new(crate::domain::Key::new("a").unwrap()),
        )
        .await;

        let report = Builder::new(config())
            .key_source(keys)
            .document_store(docs)
            .clock(FixedClock::new(at))
            .build()
            .unwrap()
            .run()
            .await
            .unwrap();

        assert_eq!(
            report.outcome("a"),
            Some(&crate::domain::KeyOutcome::Initialized {
                expire_at: at + TimeDelta::hours(1)
            })
        );
    }
}
