//! Ports - 抽象化レイヤー
//!
//! queue / pub-sub substrate は black box として扱い、ここで定義する trait 越しにだけ触ります。
//! 開発・テストでは `impls` の InMemory 実装に差し替えます。

pub mod clock;
pub mod id_generator;
pub mod pubsub;
pub mod work_queue;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::pubsub::{PubSub, Subscription};
pub use self::work_queue::WorkQueue;
