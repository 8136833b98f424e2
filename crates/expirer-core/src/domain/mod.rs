//! Domain model (keys, documents, config, reports, errors).
//!
//! I/O を一切含まない層です。store とのやりとりは `ports` を経由します。

pub mod config;
pub mod document;
pub mod duration;
pub mod errors;
pub mod key;
pub mod report;

pub use self::config::ReconcilerConfig;
pub use self::document::{Document, FieldValue, GeoPoint, is_zero_timestamp};
pub use self::duration::parse_go_duration;
pub use self::errors::ConfigError;
pub use self::key::{EmptyKey, Key};
pub use self::report::{KeyOutcome, KeyReport, RunCounts, RunReport};
