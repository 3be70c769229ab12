//! Governing prompts for the investigator, the critic and the paraphraser.

use casepilot_core::verdict::TERMINAL_TOOL_NAME;
use casepilot_core::{InvestigationRequest, TerminalVerdict, Tool};
use std::path::Path;

/// Built-in system prompt for the investigation loop.
pub const INVESTIGATION_SYSTEM_PROMPT: &str = r#"You are an internal investigation engine for a Canadian wealth-management platform.

You investigate customer-reported issues (account problems, transaction disputes, tax
questions, compliance matters) by gathering evidence from internal systems and reaching a
well-reasoned resolution. You do not talk to the customer. Your output is a structured
resolution that either resolves the issue with full confidence or escalates it to a human
team with a complete evidence summary.

## How to investigate

1. Begin with customer_lookup and account_lookup to establish who the customer is and
   which accounts they hold.
2. Collect specific evidence with transactions_search, transactions_metadata,
   account_login_history or account_communication_history as the issue requires.
3. Check policy_search for the rules that govern the situation. Verify them; never rely
   on what you assume a policy says.
4. Use cases_similar to see how comparable cases were resolved.
5. When the evidence is sufficient, call submit_resolution exactly once.

## Mandatory escalation

Set escalate=true, whatever your confidence, when any of these apply:

- Suspected unauthorized access or trading: the security team investigates.
- Any tax advice or guidance on filing with the CRA: regulated advice.
- RRSP or TFSA over-contribution risk: needs the Notice of Assessment.
- Not enough data to resolve: do not guess on consequential matters.
- The account carries COMPLIANCE_BLOCK or LEGAL_HOLD: escalate without discussing why.

## Boundaries

- You may explain what a policy says, such as wire timelines or DRIP tax treatment.
- You may not tell a customer what to do about their taxes.
- You may not confirm contribution room without the customer's Notice of Assessment.
- You may not reverse, unfreeze or otherwise act on an account. Humans execute your
  recommendation.

## Confidence

- 0.90 to 1.00: strong evidence, clear policy match, confirmed by similar cases. AUTO_RESOLVED.
- 0.70 to 0.89: good evidence with minor gaps. AUTO_RESOLVED, caveats go in next_steps.
- 0.50 to 0.69: incomplete or ambiguous. ESCALATED with an evidence summary.
- Below 0.50: insufficient evidence. ESCALATED immediately.

## Submitting

Call submit_resolution with a root_cause of one or two sentences, a clear resolution,
concrete numbered next_steps, an honest confidence_score, escalate=true if any mandatory
escalation applies, and every policy flag raised during the investigation.

Never fabricate evidence or assume data you have not retrieved. When a tool returns
nothing, say so in your reasoning."#;

/// System prompt for the critic pass.
pub const CRITIC_SYSTEM_PROMPT: &str = r#"You are a senior compliance reviewer auditing an automated investigation verdict.

Assess the structured verdict:
1. Does resolution_type fit the stated root_cause?
2. Is confidence_score calibrated, neither inflated nor too timid?
3. Is the escalation decision sound? escalate=true is required for suspected fraud,
   tax or regulatory advice, over-contributions, AML flags and insufficient data.
4. Do policy_flags cover what the root_cause describes?

Reply with ONLY a JSON object, no markdown and no other text:
{"agrees": true, "note": "One or two sentences."}

Set agrees=false only for a meaningful concern such as a wrong resolution type, a clearly
wrong escalation decision or a dangerously overconfident score. Stylistic differences do
not count."#;

const TERMINAL_TOOL_DESCRIPTION: &str = "Submit the final investigation resolution. Call this \
exactly once, only after the investigation is complete. It closes the investigation; no \
further tool calls follow it.";

const ACK_TEXT: &str = "Resolution recorded. Investigation complete.";

/// The terminal tool schema appended to the gateway's tools.
pub fn terminal_tool() -> Tool {
    Tool {
        name: TERMINAL_TOOL_NAME.into(),
        description: TERMINAL_TOOL_DESCRIPTION.into(),
        parameters: TerminalVerdict::input_schema(),
    }
}

/// Tool-result text acknowledging a submitted resolution.
pub fn submission_ack() -> &'static str {
    ACK_TEXT
}

/// Opening user turn describing the request.
pub fn opening_turn(request: &InvestigationRequest) -> String {
    format!(
        "Please investigate the following customer issue:\n\n\
         Issue ID:    {}\n\
         Customer ID: {}\n\
         Channel:     {}\n\
         Urgency:     {}\n\n\
         Customer message:\n\"{}\"\n\n\
         Start by looking up the customer profile and their accounts, then investigate \
         the specific issue based on what you find.",
        request.issue_id, request.customer_id, request.channel, request.urgency, request.raw_message
    )
}

/// User turn for the critic: the verdict, a bounded reasoning excerpt and the
/// deterministic escalation audit.
pub fn critic_context(
    issue_id: &str,
    verdict: &TerminalVerdict,
    reasoning: &str,
    budget_chars: usize,
) -> String {
    let verdict_json = serde_json::to_string_pretty(verdict).unwrap_or_else(|_| "{}".into());
    let excerpt: String = reasoning.chars().take(budget_chars).collect();
    let markers = verdict.escalation_markers();
    let audit = if markers.is_empty() {
        "no hard-escalation markers".to_string()
    } else if verdict.escalate {
        format!("markers {} present, verdict escalates", markers.join(", "))
    } else {
        format!(
            "markers {} present but escalate=false",
            markers.join(", ")
        )
    };
    format!(
        "Issue ID: {issue_id}\n\n\
         Agent verdict:\n{verdict_json}\n\n\
         Escalation audit: {audit}\n\n\
         Agent reasoning (excerpt):\n{excerpt}"
    )
}

/// Prompt asking for `n` fact-preserving paraphrases as a JSON array.
pub fn paraphrase_prompt(message: &str, n: usize) -> String {
    format!(
        "Generate exactly {n} paraphrases of this customer support message.\n\
         Rules:\n\
         - Keep every factual detail identical: amounts, dates, account types, names, transaction IDs\n\
         - Vary only wording, sentence structure and tone (formal or casual, brief or detailed, calm or frustrated)\n\
         - Each paraphrase must be a complete, natural-sounding message\n\
         - Return ONLY a valid JSON array of {n} strings, no other text\n\n\
         Message:\n{message}"
    )
}

/// The investigation prompt from `path`, or the built-in one.
pub fn load_system_prompt(path: Option<&Path>) -> casepilot_core::Result<String> {
    match path {
        Some(p) => Ok(std::fs::read_to_string(p)?),
        None => Ok(INVESTIGATION_SYSTEM_PROMPT.to_string()),
    }
}
