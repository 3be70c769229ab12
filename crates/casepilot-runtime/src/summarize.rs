//! One-line summaries of tool results for the audit trail.
//!
//! Summaries are looked up by tool name in a [`SummarizerRegistry`]; tools
//! without an entry get a generic field count.

use serde_json::Value;
use std::collections::HashMap;

/// Turns a parsed tool result into a one-line summary.
pub type Summarizer = fn(&Value) -> String;

const ERROR_PREVIEW_CHARS: usize = 200;

pub struct SummarizerRegistry {
    entries: HashMap<String, Summarizer>,
}

impl Default for SummarizerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl SummarizerRegistry {
    /// A registry with no entries; every tool gets the generic summary.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Entries for the investigation tool set.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("customer_lookup", customer_lookup);
        registry.register("account_lookup", account_lookup);
        registry.register("account_login_history", account_login_history);
        registry.register("account_communication_history", account_communication_history);
        registry.register("transactions_search", transactions_search);
        registry.register("transactions_metadata", transactions_metadata);
        registry.register("policy_search", policy_search);
        registry.register("cases_similar", cases_similar);
        registry
    }

    pub fn register(&mut self, tool_name: impl Into<String>, summarizer: Summarizer) {
        self.entries.insert(tool_name.into(), summarizer);
    }

    pub fn contains(&self, tool_name: &str) -> bool {
        self.entries.contains_key(tool_name)
    }

    /// Summarize a parsed result. An `error` field wins over any entry.
    pub fn summarize(&self, tool_name: &str, result: &Value) -> String {
        if let Some(err) = result.get("error") {
            return error_summary(&display(err));
        }
        match self.entries.get(tool_name) {
            Some(summarizer) => summarizer(result),
            None => generic(result),
        }
    }
}

/// Summary for a failed or tool-reported-error invocation.
pub fn error_summary(message: &str) -> String {
    let preview: String = message.chars().take(ERROR_PREVIEW_CHARS).collect();
    format!("ERROR: {preview}")
}

fn generic(result: &Value) -> String {
    let n = match result {
        Value::Object(map) => map.len(),
        Value::Array(items) => items.len(),
        Value::Null => 0,
        _ => 1,
    };
    format!("{n} field(s) returned")
}

/// Render a JSON value without quotes around strings.
fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".into(),
        other => other.to_string(),
    }
}

fn field(result: &Value, key: &str) -> String {
    display(result.get(key).unwrap_or(&Value::Null))
}

fn count(result: &Value) -> u64 {
    result.get("count").and_then(Value::as_u64).unwrap_or(0)
}

fn list(values: impl Iterator<Item = String>) -> String {
    format!("[{}]", values.collect::<Vec<_>>().join(", "))
}

fn customer_lookup(result: &Value) -> String {
    format!(
        "Customer: {} | KYC: {}",
        field(result, "name"),
        field(result, "kyc_status")
    )
}

fn account_lookup(result: &Value) -> String {
    let statuses = result
        .get("accounts")
        .and_then(Value::as_array)
        .map(|accounts| list(accounts.iter().map(|a| field(a, "status"))))
        .unwrap_or_else(|| "[]".into());
    format!("{} account(s) | statuses: {statuses}", count(result))
}

fn account_login_history(result: &Value) -> String {
    let countries = result
        .get("unique_countries")
        .and_then(Value::as_array)
        .map(|c| list(c.iter().map(display)))
        .unwrap_or_else(|| "[]".into());
    format!("{} events | countries: {countries}", count(result))
}

fn account_communication_history(result: &Value) -> String {
    format!("{} communication(s)", count(result))
}

fn transactions_search(result: &Value) -> String {
    let filters = result.get("filters").unwrap_or(&Value::Null);
    format!(
        "{} transaction(s) | type={} status={}",
        count(result),
        field(filters, "transaction_type"),
        field(filters, "status")
    )
}

fn transactions_metadata(result: &Value) -> String {
    let id: String = result
        .get("transaction_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .chars()
        .take(8)
        .collect();
    format!(
        "tx {id}... | {} | {} {}",
        field(result, "status"),
        field(result, "amount"),
        field(result, "currency")
    )
}

fn policy_search(result: &Value) -> String {
    let query: String = result
        .get("query")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .chars()
        .take(40)
        .collect();
    format!("{} policy chunk(s) for: '{query}'", count(result))
}

fn cases_similar(result: &Value) -> String {
    format!("{} similar case(s)", count(result))
}
