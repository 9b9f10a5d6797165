//! Impls - 実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryWorkQueue**: 開発用の work queue
//! - **InMemoryPubSub**: 開発用の pub-sub（replay なし）
//!
//! 本番用の substrate adapter（Redis など）は別クレートに置く想定です。

pub mod inmem_pubsub;
pub mod inmem_queue;

pub use self::inmem_pubsub::InMemoryPubSub;
pub use self::inmem_queue::InMemoryWorkQueue;
