//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（Redis, Firestore, 壁時計）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - Redis set は処理待ち key の置き場（key のみ）
//! - Firestore が expire field の正本
//! - 「今」は Clock から取る

pub mod clock;
pub mod document_store;
pub mod key_source;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::document_store::{DocumentStore, DocumentStoreError};
pub use self::key_source::{KeySource, KeySourceError};
