//! Placeholder assistant.
//!
//! No model is called; the reply is synthesized locally so `askAI` never
//! blocks on I/O.

/// Build the reply to an `askAI` event.
#[must_use]
pub fn placeholder_response(prompt: &str, user: &str) -> String {
    format!("AI Response to \"{prompt}\" from {user}")
}
