//! Tool-call recognition in free-form model text
//!
//! Models without native tool calling announce calls in prose, e.g.
//! `Uso la herramienta search_medicines con argumentos: {"query": "paracetamol"}`.
//! The extractor recovers those calls and computes the text that is safe to
//! show the user.
//!
//! Pattern families are tried in order (Spanish narrative, English narrative,
//! `name({...})` call syntax). The first family with any raw match decides;
//! families are never merged. Within it, each match yields a call only when
//! its arguments parse as a JSON object and its name is a known tool.
//!
//! ```rust,ignore
//! let extractor = ToolCallExtractor::new(logger);
//! let extraction = extractor.analyze(&model_text, registry.as_ref());
//! for call in &extraction.calls {
//!     invoker.invoke_call(call, timeout).await?;
//! }
//! ```

mod patterns;
mod scan;
mod display;

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::BridgeError;
use crate::logging::Logger;
use crate::tools::ToolRegistry;
use crate::types::ToolCall;

use patterns::FAMILIES;
use scan::{balanced_object_end, skip_closing_paren};

pub use display::{ELLIPSIS, TRAILING_MARGIN};

/// Name check used to accept extracted calls
pub trait ToolLookup {
    fn is_known(&self, name: &str) -> bool;
}

impl ToolLookup for ToolRegistry {
    fn is_known(&self, name: &str) -> bool {
        self.contains(name)
    }
}

impl ToolLookup for HashSet<String> {
    fn is_known(&self, name: &str) -> bool {
        self.contains(name)
    }
}

/// Result of analyzing one model reply
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// Accepted calls, in order of appearance
    pub calls: Vec<ToolCall>,
    /// Text to show the user; equal to the input when no call was accepted
    pub display_text: String,
}

impl Extraction {
    fn unchanged(text: &str) -> Self {
        Self {
            calls: Vec::new(),
            display_text: text.to_string(),
        }
    }

    pub fn has_calls(&self) -> bool {
        !self.calls.is_empty()
    }
}

fn parse_arguments(span: Option<&str>) -> Result<Map<String, Value>, String> {
    let span = span.ok_or_else(|| "unterminated JSON arguments".to_string())?;
    match serde_json::from_str::<Value>(span) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("arguments are not a JSON object".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

/// Recovers tool calls from narrative model text
pub struct ToolCallExtractor {
    logger: Arc<dyn Logger>,
}

impl ToolCallExtractor {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }

    /// Accepted calls only
    pub fn extract(&self, text: &str, known: &dyn ToolLookup) -> Vec<ToolCall> {
        self.analyze(text, known).calls
    }

    /// Accepted calls plus the display text
    pub fn analyze(&self, text: &str, known: &dyn ToolLookup) -> Extraction {
        for family in FAMILIES.iter() {
            let mut mentions = Vec::new();
            let mut calls = Vec::new();
            let mut last_accepted_end = None;
            let mut consumed = 0;

            for caps in family.regex.captures_iter(text) {
                let (Some(whole), Some(name), Some(open)) =
                    (caps.get(0), caps.name("name"), caps.name("open"))
                else {
                    continue;
                };
                // a match inside the arguments of an earlier mention
                if whole.start() < consumed {
                    continue;
                }

                let json_end = balanced_object_end(text, open.start());
                let end = match json_end {
                    Some(json_end) if family.closes_paren => skip_closing_paren(text, json_end),
                    Some(json_end) => json_end,
                    None => whole.end(),
                };
                consumed = end;
                mentions.push((whole.start(), end));

                let name = name.as_str();
                let span = json_end.map(|json_end| &text[open.start()..json_end]);
                let arguments = match parse_arguments(span) {
                    Ok(arguments) => arguments,
                    Err(message) => {
                        let err = BridgeError::ArgumentParseError {
                            tool: name.to_string(),
                            message,
                        };
                        self.logger
                            .warn(&format!("[ToolCallExtractor] Discarding call: {}", err));
                        continue;
                    }
                };

                if !known.is_known(name) {
                    continue;
                }

                calls.push(ToolCall::new(name, arguments));
                last_accepted_end = Some(end);
            }

            if mentions.is_empty() {
                continue;
            }

            let Some(last_end) = last_accepted_end else {
                return Extraction::unchanged(text);
            };

            self.logger.debug(&format!(
                "[ToolCallExtractor] {} call(s) recognized by {} patterns",
                calls.len(),
                family.label
            ));
            return Extraction {
                display_text: display::display_text(text, &mentions, last_end),
                calls,
            };
        }

        Extraction::unchanged(text)
    }
}
