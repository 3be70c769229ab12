//! The terminal verdict contract and its validator.
//!
//! A [`TerminalVerdict`] is the only structured decision an investigation
//! produces. Payloads arriving from the model through the terminal tool are
//! checked by [`TerminalVerdict::from_payload`]; nothing is repaired, a bad
//! field rejects the whole payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Name of the terminal tool that closes an investigation.
pub const TERMINAL_TOOL_NAME: &str = "submit_resolution";

/// Policy flag attached to the verdict synthesized when the turn ceiling is hit.
pub const MAX_TURNS_EXCEEDED: &str = "MAX_TURNS_EXCEEDED";

/// Policy flag attached when the model ends its turn without submitting a verdict.
pub const NO_RESOLUTION_SUBMITTED: &str = "NO_RESOLUTION_SUBMITTED";

/// Classified issue type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
    WireDelay,
    RrspOver,
    UnauthTrade,
    TaxSlip,
    EtransferFail,
    KycExpired,
    AccountFrozen,
    General,
}

impl IssueType {
    pub const ALL: [IssueType; 8] = [
        IssueType::WireDelay,
        IssueType::RrspOver,
        IssueType::UnauthTrade,
        IssueType::TaxSlip,
        IssueType::EtransferFail,
        IssueType::KycExpired,
        IssueType::AccountFrozen,
        IssueType::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::WireDelay => "WIRE_DELAY",
            IssueType::RrspOver => "RRSP_OVER",
            IssueType::UnauthTrade => "UNAUTH_TRADE",
            IssueType::TaxSlip => "TAX_SLIP",
            IssueType::EtransferFail => "ETRANSFER_FAIL",
            IssueType::KycExpired => "KYC_EXPIRED",
            IssueType::AccountFrozen => "ACCOUNT_FROZEN",
            IssueType::General => "GENERAL",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == code)
    }
}

/// The resolution outcome category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionType {
    AutoResolved,
    Escalated,
    Refunded,
    Corrected,
}

impl ResolutionType {
    pub const ALL: [ResolutionType; 4] = [
        ResolutionType::AutoResolved,
        ResolutionType::Escalated,
        ResolutionType::Refunded,
        ResolutionType::Corrected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionType::AutoResolved => "AUTO_RESOLVED",
            ResolutionType::Escalated => "ESCALATED",
            ResolutionType::Refunded => "REFUNDED",
            ResolutionType::Corrected => "CORRECTED",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == code)
    }
}

impl std::fmt::Display for ResolutionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Escalation urgency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscalationPriority {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl EscalationPriority {
    pub const ALL: [EscalationPriority; 4] = [
        EscalationPriority::Low,
        EscalationPriority::Medium,
        EscalationPriority::High,
        EscalationPriority::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationPriority::Low => "LOW",
            EscalationPriority::Medium => "MEDIUM",
            EscalationPriority::High => "HIGH",
            EscalationPriority::Critical => "CRITICAL",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == code)
    }
}

/// Why a terminal payload was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VerdictError {
    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("field '{0}' must not be empty")]
    EmptyField(&'static str),

    #[error("field '{field}' is {value}, outside [0.0, 1.0]")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("field '{field}' has unknown value '{value}'")]
    UnknownVariant { field: &'static str, value: String },

    #[error("escalation_priority is required when escalate=true")]
    MissingPriority,
}

/// The structured decision closing an investigation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalVerdict {
    pub issue_type: IssueType,
    pub root_cause: String,
    pub resolution: String,
    pub resolution_type: ResolutionType,
    #[serde(default)]
    pub next_steps: Vec<String>,
    pub confidence_score: f64,
    pub escalate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_priority: Option<EscalationPriority>,
    #[serde(default)]
    pub policy_flags: Vec<String>,
}

impl TerminalVerdict {
    /// Validate a terminal-tool payload.
    ///
    /// Required: every field except `escalation_priority` and `next_steps`;
    /// `escalation_priority` becomes required when `escalate` is true.
    pub fn from_payload(payload: &Value) -> Result<Self, VerdictError> {
        let obj = payload.as_object().ok_or(VerdictError::NotAnObject)?;

        let issue_code = non_empty_str(obj, "issue_type")?;
        let issue_type =
            IssueType::from_code(issue_code).ok_or_else(|| VerdictError::UnknownVariant {
                field: "issue_type",
                value: issue_code.to_string(),
            })?;

        let root_cause = non_empty_str(obj, "root_cause")?.to_string();
        let resolution = non_empty_str(obj, "resolution")?.to_string();

        let resolution_code = non_empty_str(obj, "resolution_type")?;
        let resolution_type = ResolutionType::from_code(resolution_code).ok_or_else(|| {
            VerdictError::UnknownVariant {
                field: "resolution_type",
                value: resolution_code.to_string(),
            }
        })?;

        let confidence_score = required(obj, "confidence_score")?
            .as_f64()
            .ok_or(VerdictError::WrongType {
                field: "confidence_score",
                expected: "a number",
            })?;
        if !(0.0..=1.0).contains(&confidence_score) {
            return Err(VerdictError::OutOfRange {
                field: "confidence_score",
                value: confidence_score,
            });
        }

        let escalate = required(obj, "escalate")?
            .as_bool()
            .ok_or(VerdictError::WrongType {
                field: "escalate",
                expected: "a boolean",
            })?;

        let escalation_priority = match obj.get("escalation_priority") {
            None | Some(Value::Null) => None,
            Some(Value::String(code)) => Some(EscalationPriority::from_code(code).ok_or_else(
                || VerdictError::UnknownVariant {
                    field: "escalation_priority",
                    value: code.clone(),
                },
            )?),
            Some(_) => {
                return Err(VerdictError::WrongType {
                    field: "escalation_priority",
                    expected: "a string",
                });
            }
        };
        if escalate && escalation_priority.is_none() {
            return Err(VerdictError::MissingPriority);
        }

        let next_steps = match obj.get("next_steps") {
            None | Some(Value::Null) => vec![],
            Some(v) => string_list(v, "next_steps")?,
        };

        let mut policy_flags = Vec::new();
        for flag in string_list(required(obj, "policy_flags")?, "policy_flags")? {
            if flag.trim().is_empty() {
                return Err(VerdictError::EmptyField("policy_flags"));
            }
            if !policy_flags.contains(&flag) {
                policy_flags.push(flag);
            }
        }

        Ok(Self {
            issue_type,
            root_cause,
            resolution,
            resolution_type,
            next_steps,
            confidence_score,
            escalate,
            escalation_priority,
            policy_flags,
        })
    }

    /// Verdict synthesized when the turn ceiling is reached without a submission.
    pub fn max_turns_fallback() -> Self {
        Self {
            issue_type: IssueType::General,
            root_cause: "Investigation did not reach a conclusion within the allowed turns."
                .into(),
            resolution: "Escalating for human review.".into(),
            resolution_type: ResolutionType::Escalated,
            next_steps: vec![
                "Human agent to review investigation trace and complete manually.".into(),
            ],
            confidence_score: 0.0,
            escalate: true,
            escalation_priority: Some(EscalationPriority::Medium),
            policy_flags: vec![MAX_TURNS_EXCEEDED.into()],
        }
    }

    /// Verdict synthesized when the model stops without calling the terminal
    /// tool. Same as [`Self::max_turns_fallback`], with `NO_RESOLUTION_SUBMITTED`
    /// added after `MAX_TURNS_EXCEEDED`.
    pub fn early_exit_fallback() -> Self {
        let mut verdict = Self::max_turns_fallback();
        verdict.policy_flags.push(NO_RESOLUTION_SUBMITTED.into());
        verdict
    }

    /// Hard-escalation categories this verdict touches, derived from its
    /// policy flags and issue type. Empty when none apply.
    pub fn escalation_markers(&self) -> Vec<&'static str> {
        let mut markers = Vec::new();
        let mut mark = |m: &'static str| {
            if !markers.contains(&m) {
                markers.push(m);
            }
        };

        if self.issue_type == IssueType::UnauthTrade {
            mark("suspected_fraud");
        }
        if self.issue_type == IssueType::RrspOver {
            mark("over_contribution");
        }
        for flag in &self.policy_flags {
            let f = flag.to_ascii_uppercase();
            if f.contains("FRAUD") || f.contains("UNAUTH") || f.contains("AML") {
                mark("suspected_fraud");
            }
            if f.contains("TAX") {
                mark("tax_advice");
            }
            if f.contains("OVER_CONTRIBUTION")
                || f.contains("OVERCONTRIBUTION")
                || f.contains("RRSP_OVER")
                || f.contains("TFSA_OVER")
            {
                mark("over_contribution");
            }
            if f.contains("INSUFFICIENT") {
                mark("insufficient_data");
            }
            if f.contains("COMPLIANCE_BLOCK") || f.contains("LEGAL_HOLD") {
                mark("compliance_hold");
            }
        }
        markers
    }

    /// True when a hard-escalation marker is present but `escalate` is false.
    pub fn has_escalation_gap(&self) -> bool {
        !self.escalate && !self.escalation_markers().is_empty()
    }

    /// JSON schema of the terminal tool input, mirroring this struct.
    pub fn input_schema() -> Value {
        let issue_types: Vec<&str> = IssueType::ALL.iter().map(|t| t.as_str()).collect();
        let resolution_types: Vec<&str> = ResolutionType::ALL.iter().map(|t| t.as_str()).collect();
        let priorities: Vec<&str> = EscalationPriority::ALL.iter().map(|p| p.as_str()).collect();
        serde_json::json!({
            "type": "object",
            "properties": {
                "issue_type": {
                    "type": "string",
                    "enum": issue_types,
                    "description": "Classified issue type."
                },
                "root_cause": {
                    "type": "string",
                    "description": "A concise explanation of the root cause of the issue."
                },
                "resolution": {
                    "type": "string",
                    "description": "What was determined and what happens next."
                },
                "resolution_type": {
                    "type": "string",
                    "enum": resolution_types,
                    "description": "The resolution outcome category."
                },
                "next_steps": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Ordered list of concrete next steps."
                },
                "confidence_score": {
                    "type": "number",
                    "minimum": 0.0,
                    "maximum": 1.0,
                    "description": "Confidence in this resolution, between 0.0 and 1.0."
                },
                "escalate": {
                    "type": "boolean",
                    "description": "True if this issue requires human review. MUST be true for: suspected fraud, tax advice, over-contributions, or insufficient data."
                },
                "escalation_priority": {
                    "type": "string",
                    "enum": priorities,
                    "description": "Priority of escalation. Required when escalate=true."
                },
                "policy_flags": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Policy flag codes triggered during investigation."
                }
            },
            "required": [
                "issue_type", "root_cause", "resolution", "resolution_type",
                "confidence_score", "escalate", "policy_flags"
            ]
        })
    }
}

fn required<'a>(obj: &'a Map<String, Value>, field: &'static str) -> Result<&'a Value, VerdictError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(VerdictError::MissingField(field)),
        Some(v) => Ok(v),
    }
}

fn non_empty_str<'a>(obj: &'a Map<String, Value>, field: &'static str) -> Result<&'a str, VerdictError> {
    let s = required(obj, field)?
        .as_str()
        .ok_or(VerdictError::WrongType {
            field,
            expected: "a string",
        })?;
    if s.trim().is_empty() {
        return Err(VerdictError::EmptyField(field));
    }
    Ok(s)
}

fn string_list(value: &Value, field: &'static str) -> Result<Vec<String>, VerdictError> {
    let wrong = VerdictError::WrongType {
        field,
        expected: "an array of strings",
    };
    let arr = value.as_array().ok_or_else(|| wrong.clone())?;
    arr.iter()
        .map(|v| v.as_str().map(String::from).ok_or_else(|| wrong.clone()))
        .collect()
}
