//! Token cost heuristics.
//!
//! These price pre-flight checks and instruction text only. Chat turns are
//! charged at the cost the provider reports after generation.

/// Flat charge for creating or duplicating an assistant, added to the
/// instruction text cost.
pub const ASSISTANT_BASE_COST: i64 = 100;

/// Coarse character-to-token heuristic: roughly four characters per token.
/// Not a tokenizer.
pub fn estimate_tokens(text: &str) -> i64 {
    text.chars().count().div_ceil(4) as i64
}

/// Tokens charged for an assistant's stored instruction text.
pub fn instruction_tokens(instructions: &str, welcome_message: &str) -> i64 {
    let mut total = String::with_capacity(instructions.len() + welcome_message.len());
    total.push_str(instructions);
    total.push_str(welcome_message);
    estimate_tokens(&total)
}
