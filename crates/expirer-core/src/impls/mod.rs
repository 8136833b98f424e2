//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryKeySource / InMemoryDocumentStore**: 開発・テスト用（失敗注入つき）
//! - **RedisKeySource**: Redis set（SMEMBERS / SREM）
//! - **FirestoreDocumentStore**: Firestore REST v1

pub mod firestore;
pub mod inmem_document_store;
pub mod inmem_key_source;
pub mod redis_key_source;

// 主要な型を再エクスポート
pub use self::firestore::{FirestoreAuth, FirestoreConfig, FirestoreDocumentStore};
pub use self::inmem_document_store::InMemoryDocumentStore;
pub use self::inmem_key_source::InMemoryKeySource;
pub use self::redis_key_source::{RedisEndpoint, RedisKeySource};
