use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of one investigation run.
pub type TraceId = Uuid;

/// Unique identifier of a replay session.
pub type SessionId = Uuid;

/// All immutable inputs to one investigation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestigationRequest {
    pub issue_id: String,
    pub customer_id: String,
    pub channel: String,
    pub urgency: String,
    pub raw_message: String,
}

impl InvestigationRequest {
    /// Same customer, channel and urgency with a different message.
    pub fn with_message(&self, raw_message: impl Into<String>) -> Self {
        Self {
            raw_message: raw_message.into(),
            ..self.clone()
        }
    }
}
