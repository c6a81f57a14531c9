use crate::domain::extraction::Extraction;
use crate::domain::schema::FieldSchema;
use crate::domain::session::Session;
use crate::flows::states::{CompletionPolicy, IntakeState, TurnAction, TurnOutcome};

/// Transition logic for one active conversation turn.
///
/// The flow only sees an already loaded session; the "no session" branch and
/// all I/O (extraction, persistence, replies) belong to the runtime.
#[derive(Clone, Copy, Debug, Default)]
pub struct IntakeFlow {
    schema: FieldSchema,
    policy: CompletionPolicy,
}

impl IntakeFlow {
    pub fn new(schema: FieldSchema, policy: CompletionPolicy) -> Self {
        Self { schema, policy }
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn policy(&self) -> CompletionPolicy {
        self.policy
    }

    /// Merges the extraction into the session and decides what happens next.
    ///
    /// Unknown keys are ignored. A follow-up question keeps the conversation
    /// active and replaces the pending one; otherwise the conversation
    /// completes, unless the policy still wants missing fields.
    pub fn apply_turn(&self, session: &mut Session, extraction: Extraction) -> TurnOutcome {
        let Extraction { fields, follow_up_question } = extraction;
        let updated_fields = session
            .merge_fields(fields.into_iter().filter(|(key, _)| self.schema.is_known(key)));

        let question = follow_up_question.or_else(|| self.policy_question(session));
        match question {
            Some(question) => {
                session.set_pending_question(Some(question.clone()));
                TurnOutcome {
                    from: IntakeState::Active,
                    to: IntakeState::Active,
                    updated_fields,
                    action: TurnAction::AskFollowUp { question },
                }
            }
            None => {
                session.set_pending_question(None);
                TurnOutcome {
                    from: IntakeState::Active,
                    to: IntakeState::Complete,
                    updated_fields,
                    action: TurnAction::Finalize,
                }
            }
        }
    }

    pub fn missing_fields(&self, session: &Session) -> Vec<&'static str> {
        self.schema.keys().filter(|key| session.field(key).is_none()).collect()
    }

    fn policy_question(&self, session: &Session) -> Option<String> {
        match self.policy {
            CompletionPolicy::TrustExtractor => None,
            CompletionPolicy::RequireAllFields => self
                .schema
                .fields()
                .iter()
                .find(|field| session.field(field.key).is_none())
                .map(|field| field.prompt.to_owned()),
        }
    }
}
