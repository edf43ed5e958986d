//! LLM response parsing into typed oracle judgments.
//!
//! The LLM returns raw text (ideally JSON). This module extracts the JSON
//! object and validates it into an [`OfferAnalysis`] or an [`Adjudication`].
//! Anything malformed degrades to the safe default (`other` / `rejected`,
//! empty maps): a response with a single unparsable quantity is discarded
//! as a whole.

use serde_json::{Map, Value};
use tracing::warn;
use trueque_types::resources::parse_resource_map;
use trueque_types::{Adjudication, LetterKind, OfferAnalysis, ResourceMap, Verdict};

use crate::error::AgentError;

const KIND_KEYS: &[&str] = &["tipo", "kind", "type"];
const OFFERED_KEYS: &[&str] = &["oferta", "offered", "offer"];
const REQUESTED_KEYS: &[&str] = &["pide", "requested", "request"];
const RECEIVED_KEYS: &[&str] = &["recursos_recibidos", "received"];
const VERDICT_KEYS: &[&str] = &["decision", "verdict"];

/// JSON schema constraining the adjudication reply, for backends that
/// support structured output.
pub fn adjudication_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "decision": {"type": "string", "enum": ["aceptada", "rechazada"]},
            "oferta": {"type": "object", "additionalProperties": {"type": "integer", "minimum": 0}},
            "pide": {"type": "object", "additionalProperties": {"type": "integer", "minimum": 0}}
        },
        "required": ["decision", "oferta", "pide"],
        "additionalProperties": false
    })
}

/// Parse a classification reply. Falls back to [`OfferAnalysis::other`].
pub fn parse_classification(raw: &str) -> OfferAnalysis {
    match extract_object(raw).and_then(|object| classification_from(&object)) {
        Ok(analysis) => analysis,
        Err(e) => {
            warn!(error = %e, raw_response = raw, "failed to parse classification, treating letter as other");
            OfferAnalysis::other()
        }
    }
}

/// Parse an adjudication reply. Falls back to [`Adjudication::rejected`].
pub fn parse_adjudication(raw: &str) -> Adjudication {
    match extract_object(raw).and_then(|object| adjudication_from(&object)) {
        Ok(adjudication) => adjudication,
        Err(e) => {
            warn!(error = %e, raw_response = raw, "failed to parse adjudication, rejecting offer");
            Adjudication::rejected()
        }
    }
}

fn classification_from(object: &Map<String, Value>) -> Result<OfferAnalysis, AgentError> {
    let kind = lookup(object, KIND_KEYS)
        .and_then(Value::as_str)
        .map_or(LetterKind::Other, LetterKind::from_label);

    Ok(OfferAnalysis {
        kind,
        offered: map_field(object, OFFERED_KEYS)?,
        requested: map_field(object, REQUESTED_KEYS)?,
        received: map_field(object, RECEIVED_KEYS)?,
    })
}

fn adjudication_from(object: &Map<String, Value>) -> Result<Adjudication, AgentError> {
    let verdict = lookup(object, VERDICT_KEYS)
        .and_then(Value::as_str)
        .map_or(Verdict::Rejected, Verdict::from_label);

    Ok(Adjudication {
        verdict,
        offered: map_field(object, OFFERED_KEYS)?,
        requested: map_field(object, REQUESTED_KEYS)?,
    })
}

fn lookup<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| object.get(*key))
}

fn map_field(object: &Map<String, Value>, keys: &[&str]) -> Result<ResourceMap, AgentError> {
    lookup(object, keys).map_or_else(
        || Ok(ResourceMap::new()),
        |value| parse_resource_map(value).map_err(|e| AgentError::Parse(e.to_string())),
    )
}

/// Find the JSON object in the raw text.
///
/// Attempts, in order:
/// 1. Direct parse
/// 2. Extract from a markdown code block
/// 3. Strip trailing commas and retry (also inside a code block)
/// 4. The first balanced `{...}` span in the text
fn extract_object(raw: &str) -> Result<Map<String, Value>, AgentError> {
    let trimmed = raw.trim();

    let mut candidates: Vec<String> = vec![trimmed.to_owned()];
    if let Some(block) = extract_json_from_codeblock(trimmed) {
        candidates.push(block.to_owned());
        candidates.push(strip_trailing_commas(block));
    }
    candidates.push(strip_trailing_commas(trimmed));
    if let Some(span) = first_object_span(trimmed) {
        candidates.push(span.to_owned());
        candidates.push(strip_trailing_commas(span));
    }

    candidates
        .iter()
        .find_map(|candidate| match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(object)) => Some(object),
            _ => None,
        })
        .ok_or_else(|| AgentError::Parse(format!("no JSON object found in: {trimmed}")))
}

/// Extract the contents of the first fenced code block, if any.
fn extract_json_from_codeblock(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = text.get(start.checked_add(3)?..)?;
    let body_start = after_fence.find('\n').map_or(0, |i| i.saturating_add(1));
    let body = after_fence.get(body_start..)?;
    let end = body.find("```")?;
    body.get(..end).map(str::trim)
}

/// Remove commas that directly precede a closing brace or bracket.
///
/// Whitespace following any comma is dropped.
fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_comma = false;
    for c in text.chars() {
        if pending_comma {
            if c.is_whitespace() {
                continue;
            }
            if c != '}' && c != ']' {
                out.push(',');
            }
            pending_comma = false;
        }
        if c == ',' {
            pending_comma = true;
        } else {
            out.push(c);
        }
    }
    if pending_comma {
        out.push(',');
    }
    out
}

/// The first balanced `{...}` span, ignoring braces inside strings.
fn first_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth: u32 = 0;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text.get(start..)?.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth = depth.saturating_add(1),
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let end = start.checked_add(offset)?.checked_add(1)?;
                    return text.get(start..end);
                }
            }
            _ => {}
        }
    }
    None
}
