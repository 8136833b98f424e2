//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **ReconcilerBuilder**: 構築とワイヤリング（起動時検証）
//! - **Reconciler**: 1 回分の run（取得→延長→set から削除）
//! - **ReconcileError**: run を止めたエラーと運用分類

pub mod builder;
pub mod error;
pub mod reconciler;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, ReconcilerBuilder};
pub use self::error::ReconcileError;
pub use self::reconciler::{Reconciler, next_expiry};
