//! Domain model (ids, envelope, notification, state, errors).
//!
//! queue や pub-sub の実装には依存しません。ワイヤ形式と状態遷移だけを定義します。

pub mod envelope;
pub mod errors;
pub mod ids;
pub mod notification;
pub mod state;
pub mod submission;

pub use self::envelope::JobEnvelope;
pub use self::errors::{BrokerError, CodecError, ErrorBody, RegistryError, SubmitError};
pub use self::ids::{ParseTaskIdError, TaskId};
pub use self::notification::{ResultNotification, TaskOutcome};
pub use self::state::{Completion, WaiterState};
pub use self::submission::Submission;
