//! App - アプリケーション層
//!
//! ports を組み合わせて request/response bridge を実装します。
//!
//! # 主要コンポーネント
//! - **TaskRegistry**: in-flight な taskId → Waiter の対応表
//! - **Gateway**: submission の受付（validate → register → enqueue → wait）
//! - **Demultiplexer**: 単一 subscription から Waiter への振り分け
//! - **Sweeper**: deadline を過ぎた Waiter の expire
//! - **BridgeBuilder / Bridge**: 上記のワイヤリングと起動・停止

pub mod bridge;
pub mod builder;
pub mod demux;
pub mod gateway;
pub mod registry;
pub mod status;
pub mod sweeper;

pub use self::bridge::Bridge;
pub use self::builder::{BridgeBuilder, BuildError};
pub use self::demux::{Demultiplexer, RouteOutcome};
pub use self::gateway::Gateway;
pub use self::registry::{TaskRegistry, Waiter};
pub use self::status::{DemuxCounts, DemuxStats, RegistryCounts};
pub use self::sweeper::Sweeper;
