//! expirer-core
//!
//! Redis set に積まれた key ごとに Firestore ドキュメントの expire field を延長し、
//! 処理した key を set から取り除くバッチ処理の中核。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（key, document, config, report, errors）
//! - **ports**: 抽象化レイヤー（KeySource, DocumentStore, Clock）
//! - **app**: アプリケーションロジック（ReconcilerBuilder, Reconciler）
//! - **impls**: 実装（Redis, Firestore, InMemory）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{BuildError, ReconcileError, Reconciler, ReconcilerBuilder};
pub use domain::{ConfigError, ReconcilerConfig, RunCounts, RunReport};
