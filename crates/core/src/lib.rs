pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod notify;

pub use domain::extraction::Extraction;
pub use domain::order::{Order, OrderLocation};
pub use domain::schema::{FieldDefinition, FieldSchema, ORDER_FIELDS};
pub use domain::session::{ConversationId, Session};
pub use errors::{ApplicationError, InterfaceError};
pub use flows::{CompletionPolicy, IntakeFlow, IntakeState, TurnAction, TurnOutcome};
pub use notify::{CustomerNotifier, NotifyError, RecordingNotifier, StaffNotifier};
