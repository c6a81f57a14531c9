//! Order intake runtime.
//!
//! The runtime turns each customer message into a conversation turn:
//! 1. **Extraction** (`extraction`) asks the language model for order fields
//!    and, if needed, one follow-up question.
//! 2. **Transition** is the pure `IntakeFlow` from `stampdesk-core`.
//! 3. **Finalization** (`finalizer`) persists the order and notifies staff.
//!
//! The model only reads text. It never decides when an order is stored or who
//! gets notified.

pub mod credentials;
pub mod extraction;
pub mod finalizer;
pub mod llm;
pub mod runtime;

pub use credentials::{Credential, CredentialError, CredentialProvider, IamTokenProvider, StaticApiKey};
pub use extraction::ExtractionGateway;
pub use finalizer::{FinalizeError, FinalizeStage, OrderFinalizer};
pub use llm::{LlmClient, LlmError, YandexGptClient};
pub use runtime::{IntakeError, IntakeRuntime, TurnReply};
