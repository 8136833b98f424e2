//! Reconciler - expire field を延長して set を空にする 1 回分の run
//!
//! # 流れ
//! 1. Key Source から set のスナップショットを取る（空なら何もせず終了）
//! 2. key ごとに: 取得 → 基準時刻の決定 → `base + increment` を merge-update
//!    - NotFound はスキップ（削除対象には含める）
//!    - それ以外の失敗は即 run 全体を中断（set には触らない）
//! 3. スナップショットの key を 1 回の操作で set から取り除く
//!
//! # 既知の制約
//! 3 が失敗すると、2 で書き込んだドキュメントはそのまま残り、key も set に残る。
//! 次回 run で同じ key が再処理され、increment が二重にかかる。

use chrono::{DateTime, TimeDelta, Utc};

use crate::domain::{Document, FieldValue, Key, KeyOutcome, KeyReport, ReconcilerConfig, RunReport};
use crate::ports::{Clock, DocumentStore, DocumentStoreError, KeySource, SystemClock};

use super::error::ReconcileError;

/// 次の expiry を計算する
///
/// 非ゼロの timestamp がすでにあればそれを、なければ `now` を基準にする。
/// 戻り値は `(以前の値, 新しい値)`。範囲外になるときは `None`。
pub fn next_expiry(
    doc: &Document,
    field: &str,
    now: DateTime<Utc>,
    increment: TimeDelta,
) -> Option<(Option<DateTime<Utc>>, DateTime<Utc>)> {
    let previous = doc.expiry(field);
    let base = previous.unwrap_or(now);
    base.checked_add_signed(increment)
        .map(|expire_at| (previous, expire_at))
}

/// key 1 件分の失敗（どの段階で失敗したか）
enum KeyFailure {
    Fetch(DocumentStoreError),
    Write(DocumentStoreError),
    Overflow,
}

/// Reconciler は ports を束ねて run を実行する
///
/// # 設計原則
/// - 設定は構築時に検証済み（run 中に設定エラーは起きない）
/// - 完全に逐次（1 key の取得→書き込みが終わってから次へ）
/// - リトライしない（再実行は外側のスケジューラの責務）
pub struct Reconciler<K, D, C = SystemClock> {
    config: ReconcilerConfig,
    keys: K,
    docs: D,
    clock: C,
}

impl<K, D, C> Reconciler<K, D, C>
where
    K: KeySource,
    D: DocumentStore,
    C: Clock,
{
    /// 設定を検証して Reconciler を作成
    ///
    /// # Errors
    /// 設定が不正なら `ConfigError`（I/O は一切しない）
    pub fn new(
        config: ReconcilerConfig,
        keys: K,
        docs: D,
        clock: C,
    ) -> Result<Self, crate::domain::ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            keys,
            docs,
            clock,
        })
    }

    /// 1 回分の run を実行する
    #[tracing::instrument(
        name = "reconcile",
        skip_all,
        fields(set = %self.config.key_set, collection = %self.config.collection)
    )]
    pub async fn run(&self) -> Result<RunReport, ReconcileError> {
        let set = &self.config.key_set;

        let batch = self
            .keys
            .members(set)
            .await
            .map_err(|source| ReconcileError::ReadKeys {
                set: set.clone(),
                source,
            })?;

        if batch.is_empty() {
            tracing::info!("key set is empty, nothing to do");
            return Ok(RunReport::default());
        }
        tracing::info!(batch = batch.len(), "reconciling batch");

        let mut reports = Vec::with_capacity(batch.len());
        let mut applied: Vec<Key> = Vec::new();

        for key in &batch {
            let outcome = match self.reconcile_key(key).await {
                Ok(outcome) => outcome,
                Err(failure) => {
                    let key = key.clone();
                    return Err(match failure {
                        KeyFailure::Fetch(source) => ReconcileError::Fetch {
                            key,
                            applied,
                            source,
                        },
                        KeyFailure::Write(source) => ReconcileError::Write {
                            key,
                            applied,
                            source,
                        },
                        KeyFailure::Overflow => ReconcileError::ExpiryOverflow { key, applied },
                    });
                }
            };
            if !matches!(outcome, KeyOutcome::Missing) {
                applied.push(key.clone());
            }
            reports.push(KeyReport {
                key: key.clone(),
                outcome,
            });
        }

        let removed = self
            .keys
            .remove_members(set, &batch)
            .await
            .map_err(|source| ReconcileError::RemoveKeys {
                set: set.clone(),
                keys: applied,
                source,
            })?;

        let report = RunReport {
            keys: reports,
            removed,
        };
        let counts = report.counts();
        tracing::info!(
            batch = counts.batch,
            initialized = counts.initialized,
            extended = counts.extended,
            missing = counts.missing,
            removed = counts.removed,
            "reconcile finished"
        );
        Ok(report)
    }

    async fn reconcile_key(&self, key: &Key) -> Result<KeyOutcome, KeyFailure> {
        let collection = &self.config.collection;
        let field = &self.config.expire_field;

        let doc = match self
            .docs
            .get_fields(collection, key, &[field.as_str()])
            .await
        {
            Ok(doc) => doc,
            Err(err) if err.is_not_found() => {
                tracing::warn!(%key, "document not found, skipping");
                return Ok(KeyOutcome::Missing);
            }
            Err(err) => return Err(KeyFailure::Fetch(err)),
        };

        let (previous, expire_at) =
            next_expiry(&doc, field, self.clock.now(), self.config.increment)
                .ok_or(KeyFailure::Overflow)?;

        self.docs
            .merge_update(collection, key, field, FieldValue::Timestamp(expire_at))
            .await
            .map_err(KeyFailure::Write)?;

        tracing::debug!(%key, ?previous, %expire_at, "expiry updated");
        Ok(match previous {
            Some(previous) => KeyOutcome::Extended {
                previous,
                expire_at,
            },
            None => KeyOutcome::Initialized { expire_at },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConfigError;
    use crate::impls::{InMemoryDocumentStore, InMemoryKeySource};
    use crate::ports::{FixedClock, KeySourceError};
    use async_trait::async_trait;
    use chrono::TimeZone;

    const SET: &str = "pending";
    const COLLECTION: &str = "sessions";
    const FIELD: &str = "expireAt";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn key(s: &str) -> Key {
        Key::new(s).unwrap()
    }

    fn config() -> ReconcilerConfig {
        ReconcilerConfig::new(SET, COLLECTION, FIELD, TimeDelta::minutes(5))
    }

    fn reconciler<D: DocumentStore>(
        keys: &InMemoryKeySource,
        docs: D,
    ) -> Reconciler<InMemoryKeySource, D, FixedClock> {
        Reconciler::new(config(), keys.clone(), docs, FixedClock::new(now())).unwrap()
    }

    async fn seed_keys(keys: &[&str]) -> InMemoryKeySource {
        let source = InMemoryKeySource::new();
        for k in keys {
            source.add(SET, k).await;
        }
        source
    }

    async fn expiry_of(docs: &InMemoryDocumentStore, k: &str) -> Option<FieldValue> {
        docs.peek(COLLECTION, k).await.and_then(|d| d.get(FIELD).cloned())
    }

    #[test]
    fn next_expiry_prefers_existing_timestamp() {
        let t = now() - TimeDelta::hours(1);
        let doc = Document::new(key("a")).with_field(FIELD, FieldValue::Timestamp(t));
        let (previous, next) = next_expiry(&doc, FIELD, now(), TimeDelta::minutes(5)).unwrap();
        assert_eq!(previous, Some(t));
        assert_eq!(next, t + TimeDelta::minutes(5));
    }

    #[test]
    fn next_expiry_overflow_is_none() {
        let doc = Document::new(key("a")).with_field(
            FIELD,
            FieldValue::Timestamp(DateTime::<Utc>::MAX_UTC - TimeDelta::seconds(1)),
        );
        assert!(next_expiry(&doc, FIELD, now(), TimeDelta::hours(1)).is_none());
    }

    #[test]
    fn invalid_config_is_rejected_before_any_io() {
        let keys = InMemoryKeySource::new();
        let docs = InMemoryDocumentStore::new();
        let config = ReconcilerConfig {
            increment: TimeDelta::zero(),
            ..config()
        };
        let result = Reconciler::new(config, keys, docs, FixedClock::new(now()));
        assert!(matches!(
            result,
            Err(ConfigError::NonPositiveIncrement(_))
        ));
    }

    #[tokio::test]
    async fn missing_document_is_skipped_but_key_removed() {
        let keys = seed_keys(&["ghost"]).await;
        let docs = InMemoryDocumentStore::new();

        let report = reconciler(&keys, docs.clone()).run().await.unwrap();

        assert_eq!(report.outcome("ghost"), Some(&KeyOutcome::Missing));
        assert!(docs.is_empty().await);
        assert!(docs.update_calls().await.is_empty());
        assert!(keys.snapshot(SET).await.is_empty());
    }

    #[tokio::test]
    async fn first_write_uses_now_plus_increment() {
        let keys = seed_keys(&["a"]).await;
        let docs = InMemoryDocumentStore::new();
        docs.insert(COLLECTION, Document::new(key("a"))).await;

        let report = reconciler(&keys, docs.clone()).run().await.unwrap();

        let expected = now() + TimeDelta::minutes(5);
        assert_eq!(expiry_of(&docs, "a").await, Some(FieldValue::Timestamp(expected)));
        assert_eq!(
            report.outcome("a"),
            Some(&KeyOutcome::Initialized {
                expire_at: expected
            })
        );
    }

    #[tokio::test]
    async fn first_write_with_system_clock_is_close_to_now() {
        let keys = seed_keys(&["a"]).await;
        let docs = InMemoryDocumentStore::new();
        docs.insert(COLLECTION, Document::new(key("a"))).await;

        let before = Utc::now();
        Reconciler::new(config(), keys.clone(), docs.clone(), SystemClock)
            .unwrap()
            .run()
            .await
            .unwrap();
        let after = Utc::now();

        let Some(FieldValue::Timestamp(written)) = expiry_of(&docs, "a").await else {
            panic!("expire field was not written as a timestamp");
        };
        assert!(written >= before + TimeDelta::minutes(5));
        assert!(written <= after + TimeDelta::minutes(5));
    }

    #[tokio::test]
    async fn existing_expiry_is_extended_exactly() {
        let t = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let keys = seed_keys(&["a"]).await;
        let docs = InMemoryDocumentStore::new();
        docs.insert(
            COLLECTION,
            Document::new(key("a")).with_field(FIELD, FieldValue::Timestamp(t)),
        )
        .await;

        reconciler(&keys, docs.clone()).run().await.unwrap();

        assert_eq!(
            expiry_of(&docs, "a").await,
            Some(FieldValue::Timestamp(t + TimeDelta::minutes(5)))
        );
    }

    #[tokio::test]
    async fn zero_or_mistyped_expiry_falls_back_to_now() {
        let keys = seed_keys(&["epoch", "text"]).await;
        let docs = InMemoryDocumentStore::new();
        docs.insert(
            COLLECTION,
            Document::new(key("epoch"))
                .with_field(FIELD, FieldValue::Timestamp(DateTime::<Utc>::UNIX_EPOCH)),
        )
        .await;
        docs.insert(
            COLLECTION,
            Document::new(key("text")).with_field(FIELD, FieldValue::String("soon".into())),
        )
        .await;

        reconciler(&keys, docs.clone()).run().await.unwrap();

        let expected = Some(FieldValue::Timestamp(now() + TimeDelta::minutes(5)));
        assert_eq!(expiry_of(&docs, "epoch").await, expected);
        assert_eq!(expiry_of(&docs, "text").await, expected);
    }

    #[tokio::test]
    async fn other_fields_are_left_untouched() {
        let keys = seed_keys(&["a"]).await;
        let docs = InMemoryDocumentStore::new();
        let original = Document::new(key("a"))
            .with_field("owner", FieldValue::String("kamo".into()))
            .with_field("hits", FieldValue::Integer(7))
            .with_field("tags", FieldValue::Array(vec![FieldValue::Boolean(true)]));
        docs.insert(COLLECTION, original.clone()).await;

        reconciler(&keys, docs.clone()).run().await.unwrap();

        let mut after = docs.peek(COLLECTION, "a").await.unwrap();
        assert!(after.fields.remove(FIELD).is_some());
        assert_eq!(after, original);
    }

    /// 最初の get の最中に、別プロセスが set に key を足したことにする
    struct AddsKeyDuringRun {
        inner: InMemoryDocumentStore,
        keys: InMemoryKeySource,
    }

    #[async_trait]
    impl DocumentStore for AddsKeyDuringRun {
        async fn get_document(
            &self,
            collection: &str,
            key: &Key,
        ) -> Result<Document, DocumentStoreError> {
            self.keys.add(SET, "late").await;
            self.inner.get_document(collection, key).await
        }

        async fn merge_update(
            &self,
            collection: &str,
            key: &Key,
            field: &str,
            value: FieldValue,
        ) -> Result<(), DocumentStoreError> {
            self.inner.merge_update(collection, key, field, value).await
        }
    }

    #[tokio::test]
    async fn keys_added_during_run_are_kept() {
        let keys = seed_keys(&["a", "b"]).await;
        let inner = InMemoryDocumentStore::new();
        inner.insert(COLLECTION, Document::new(key("a"))).await;
        let docs = AddsKeyDuringRun {
            inner: inner.clone(),
            keys: keys.clone(),
        };

        let report = reconciler(&keys, docs).run().await.unwrap();

        assert_eq!(report.keys.len(), 2);
        assert_eq!(report.removed, 2);
        assert_eq!(keys.snapshot(SET).await, vec!["late"]);
        assert!(inner.peek(COLLECTION, "late").await.is_none());
        assert_eq!(inner.get_calls().await, vec![key("a"), key("b")]);
    }

    #[tokio::test]
    async fn write_failure_aborts_without_removing_keys() {
        let keys = seed_keys(&["a", "b", "c"]).await;
        let docs = InMemoryDocumentStore::new();
        for k in ["a", "b", "c"] {
            docs.insert(COLLECTION, Document::new(key(k))).await;
        }
        docs.fail_update_for("b").await;

        let err = reconciler(&keys, docs.clone()).run().await.unwrap_err();

        assert!(matches!(&err, ReconcileError::Write { key, .. } if key.as_str() == "b"));
        assert_eq!(err.applied_keys(), &[key("a")]);
        // a は書き込み済み、c には到達しない
        assert!(expiry_of(&docs, "a").await.is_some());
        assert!(expiry_of(&docs, "c").await.is_none());
        assert_eq!(docs.get_calls().await, vec![key("a"), key("b")]);
        assert_eq!(keys.snapshot(SET).await, vec!["a", "b", "c"]);
        assert!(keys.remove_calls().await.is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_aborts_without_removing_keys() {
        let keys = seed_keys(&["a", "b"]).await;
        let docs = InMemoryDocumentStore::new();
        docs.insert(COLLECTION, Document::new(key("b"))).await;
        docs.fail_get_for("a").await;

        let err = reconciler(&keys, docs.clone()).run().await.unwrap_err();

        assert!(matches!(&err, ReconcileError::Fetch { key, .. } if key.as_str() == "a"));
        assert!(err.applied_keys().is_empty());
        assert!(docs.update_calls().await.is_empty());
        assert_eq!(keys.snapshot(SET).await, vec!["a", "b"]);
        assert!(keys.remove_calls().await.is_empty());
    }

    #[tokio::test]
    async fn empty_set_performs_no_store_calls() {
        let keys = InMemoryKeySource::new();
        let docs = InMemoryDocumentStore::new();

        let report = reconciler(&keys, docs.clone()).run().await.unwrap();

        assert!(report.is_empty());
        assert_eq!(keys.members_calls().await, 1);
        assert!(keys.remove_calls().await.is_empty());
        assert!(docs.get_calls().await.is_empty());
        assert!(docs.update_calls().await.is_empty());
    }

    #[tokio::test]
    async fn members_failure_is_fatal() {
        let keys = seed_keys(&["a"]).await;
        keys.fail_members().await;
        let docs = InMemoryDocumentStore::new();

        let err = reconciler(&keys, docs.clone()).run().await.unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::ReadKeys {
                source: KeySourceError::Connection(_),
                ..
            }
        ));
        assert!(docs.get_calls().await.is_empty());
    }

    #[tokio::test]
    async fn remove_failure_keeps_written_documents() {
        let t = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let keys = seed_keys(&["a"]).await;
        keys.fail_remove().await;
        let docs = InMemoryDocumentStore::new();
        docs.insert(
            COLLECTION,
            Document::new(key("a")).with_field(FIELD, FieldValue::Timestamp(t)),
        )
        .await;

        let err = reconciler(&keys, docs.clone()).run().await.unwrap_err();

        assert!(matches!(err, ReconcileError::RemoveKeys { .. }));
        assert_eq!(err.applied_keys(), &[key("a")]);
        assert_eq!(
            expiry_of(&docs, "a").await,
            Some(FieldValue::Timestamp(t + TimeDelta::minutes(5)))
        );
        assert_eq!(keys.snapshot(SET).await, vec!["a"]);
    }

    #[tokio::test]
    async fn rerun_after_failed_remove_bumps_twice() {
        let t = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let keys = seed_keys(&["a"]).await;
        let docs = InMemoryDocumentStore::new();
        docs.insert(
            COLLECTION,
            Document::new(key("a")).with_field(FIELD, FieldValue::Timestamp(t)),
        )
        .await;

        keys.fail_remove().await;
        assert!(reconciler(&keys, docs.clone()).run().await.is_err());

        let healthy = InMemoryKeySource::new();
        healthy.add(SET, "a").await;
        reconciler(&healthy, docs.clone()).run().await.unwrap();

        assert_eq!(
            expiry_of(&docs, "a").await,
            Some(FieldValue::Timestamp(t + TimeDelta::minutes(10)))
        );
    }

    #[tokio::test]
    async fn mixed_batch_scenario() {
        let keys = seed_keys(&["a", "b", "c"]).await;
        let docs = InMemoryDocumentStore::new();
        docs.insert(COLLECTION, Document::new(key("a"))).await;
        docs.insert(
            COLLECTION,
            Document::new(key("b"))
                .with_field(FIELD, FieldValue::Timestamp(now() - TimeDelta::minutes(10))),
        )
        .await;

        let report = reconciler(&keys, docs.clone()).run().await.unwrap();

        assert_eq!(
            expiry_of(&docs, "a").await,
            Some(FieldValue::Timestamp(now() + TimeDelta::minutes(5)))
        );
        assert_eq!(
            expiry_of(&docs, "b").await,
            Some(FieldValue::Timestamp(now() - TimeDelta::minutes(5)))
        );
        assert!(docs.peek(COLLECTION, "c").await.is_none());
        assert!(keys.snapshot(SET).await.is_empty());

        let counts = report.counts();
        assert_eq!(counts.batch, 3);
        assert_eq!(counts.initialized, 1);
        assert_eq!(counts.extended, 1);
        assert_eq!(counts.missing, 1);
        assert_eq!(counts.removed, 3);
    }
}
