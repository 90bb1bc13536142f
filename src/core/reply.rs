//! Keyword reply generator

use crate::config::replies::{self, ReplyTable};
use crate::conversation::Persona;

/// Reply table for a persona, `None` for unrecognized tags
pub fn table_for(persona: &Persona) -> Option<&'static ReplyTable> {
    match persona {
        Persona::Professional => Some(&replies::PROFESSIONAL),
        Persona::Friend => Some(&replies::FRIEND),
        Persona::Coder => Some(&replies::CODER),
        Persona::Other(_) => None,
    }
}

/// Pick the reply for `input` under `persona`.
///
/// Matching is case-insensitive substring search over the persona's rules in
/// table order; the first rule that fires wins.
pub fn generate_reply(persona: &Persona, input: &str) -> &'static str {
    let Some(table) = table_for(persona) else {
        return replies::UNKNOWN_PERSONA;
    };

    let lowered = input.to_lowercase();
    table
        .rules
        .iter()
        .find(|rule| rule.matches(&lowered))
        .map(|rule| rule.response)
        .unwrap_or(table.fallback)
}
