//! docrelay-core
//!
//! work queue + pub-sub の上に「1 回きりの request/response」を載せる bridge。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, envelope, notification, state, errors）
//! - **ports**: 抽象化レイヤー（WorkQueue, PubSub, Clock, IdGenerator）
//! - **app**: registry, gateway, demultiplexer, sweeper, bridge
//! - **impls**: InMemory 実装（開発・テスト用）
//! - **config**: BridgeConfig / WorkerConfig
//! - **worker**: queue を消費して結果を publish する worker 側

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod worker;

pub use app::{Bridge, BridgeBuilder, BuildError, Gateway};
pub use config::{BridgeConfig, WorkerConfig};
pub use domain::{ErrorBody, Submission, SubmitError, TaskId, TaskOutcome};
pub use worker::{DocumentProcessor, WorkerGroup};
