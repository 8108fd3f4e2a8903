//! Processor request/reply types and their wire form
//!
//! The processor predates the canonical field names and still reads and
//! writes a set of legacy aliases (`visitor_name`, `host_confirmed`, ...).
//! Outbound requests carry both spellings; inbound aliases are folded into
//! the canonical fields.

use crate::state_machine::{FlowStep, VisitorFields};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One visitor message plus the context the processor needs
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorRequest {
    pub message: String,
    pub current_step: FlowStep,
    pub fields: VisitorFields,
}

/// Interpreted message
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorReply {
    /// Text shown to the visitor as the next bot turn
    pub response: String,
    /// `None` keeps the current step
    pub next_step: Option<FlowStep>,
    /// Fields to merge; empty when the processor sent none
    pub fields: VisitorFields,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
pub(super) struct WireRequest<'a> {
    message: &'a str,
    current_step: &'a str,
    visitor_info: OutboundVisitorInfo<'a>,
}

#[derive(Debug, Serialize)]
struct OutboundVisitorInfo<'a> {
    #[serde(flatten)]
    fields: VisitorFields,
    #[serde(skip_serializing_if = "Option::is_none")]
    visitor_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    visitor_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    visitor_cnic: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    visitor_phone: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    visitor_email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    host_confirmed: Option<&'a str>,
}

impl<'a> WireRequest<'a> {
    pub(super) fn new(request: &'a ProcessorRequest) -> Self {
        let source = &request.fields;

        let mut fields = source.clone();
        // A raw value kept in `extra` already fills the key
        if !fields.extra.contains_key("employee_selection_mode") {
            fields.employee_selection_mode.get_or_insert(false);
        }
        if !fields.extra.contains_key("employee_matches") {
            fields.employee_matches.get_or_insert_with(Vec::new);
        }
        for alias in LEGACY_ALIASES {
            fields.extra.remove(alias);
        }

        Self {
            message: &request.message,
            current_step: request.current_step.as_str(),
            visitor_info: OutboundVisitorInfo {
                fields,
                visitor_type: source.visitor_type.as_deref(),
                visitor_name: source.full_name.as_deref(),
                visitor_cnic: source.cnic.as_deref(),
                visitor_phone: source.phone.as_deref(),
                visitor_email: source.email.as_deref(),
                host_confirmed: source.host.as_deref(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct WireReply {
    response: String,
    #[serde(default)]
    next_step: Option<String>,
    #[serde(default)]
    visitor_info: Option<VisitorFields>,
}

impl From<WireReply> for ProcessorReply {
    fn from(wire: WireReply) -> Self {
        let mut fields = wire.visitor_info.unwrap_or_default();
        fold_legacy_aliases(&mut fields);

        ProcessorReply {
            response: wire.response,
            next_step: wire
                .next_step
                .filter(|step| !step.trim().is_empty())
                .map(FlowStep::new),
            fields,
        }
    }
}

const LEGACY_ALIASES: [&str; 6] = [
    "visitor_type",
    "visitor_name",
    "visitor_cnic",
    "visitor_phone",
    "visitor_email",
    "host_confirmed",
];

/// Canonical fields win; an alias only fills a gap
fn fold_legacy_aliases(fields: &mut VisitorFields) {
    let extra = &mut fields.extra;
    fill(&mut fields.visitor_type, take_string(extra, "visitor_type"));
    fill(&mut fields.full_name, take_string(extra, "visitor_name"));
    fill(&mut fields.cnic, take_string(extra, "visitor_cnic"));
    fill(&mut fields.phone, take_string(extra, "visitor_phone"));
    fill(&mut fields.email, take_string(extra, "visitor_email"));
    fill(&mut fields.host, take_string(extra, "host_confirmed"));
}

fn take_string(extra: &mut Map<String, Value>, key: &str) -> Option<String> {
    match extra.remove(key)? {
        Value::String(value) => Some(value),
        _ => None,
    }
}

fn fill(target: &mut Option<String>, alias: Option<String>) {
    if target.is_none() {
        *target = alias;
    }
}
