use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntakeState {
    NoSession,
    Active,
    Complete,
}

/// When a conversation counts as complete.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionPolicy {
    /// Complete as soon as the extractor has no follow-up question, even if
    /// some schema fields are still empty.
    #[default]
    TrustExtractor,
    /// Additionally require every schema field to be filled; missing fields
    /// are asked for one at a time in schema order.
    RequireAllFields,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnAction {
    AskFollowUp { question: String },
    Finalize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub from: IntakeState,
    pub to: IntakeState,
    pub updated_fields: Vec<String>,
    pub action: TurnAction,
}

impl TurnOutcome {
    pub fn is_complete(&self) -> bool {
        self.to == IntakeState::Complete
    }

    pub fn question(&self) -> Option<&str> {
        match &self.action {
            TurnAction::AskFollowUp { question } => Some(question),
            TurnAction::Finalize => None,
        }
    }
}
