//! Deterministic token estimation for the consistency validator.
//!
//! A rough character-count heuristic is enough here: the validator only
//! needs an independent, reproducible yardstick to band-check reported
//! totals against, not an exact tokenizer.

/// Tokens the surrounding prompt scaffolding costs regardless of input
const PROMPT_OVERHEAD_TOKENS: u64 = 32;

/// Characters per token, the usual rule of thumb for English-plus-SQL text
const CHARS_PER_TOKEN: f64 = 4.0;

/// Estimate how many tokens a question plus its schema context consumes
pub fn estimate_tokens(question_text: &str, schema_summary: &str) -> u64 {
    let chars = question_text.chars().count() + schema_summary.chars().count();
    (chars as f64 / CHARS_PER_TOKEN).ceil() as u64 + PROMPT_OVERHEAD_TOKENS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_identical_input() {
        let a = estimate_tokens("how many orders?", "orders(id, amount)");
        let b = estimate_tokens("how many orders?", "orders(id, amount)");
        assert_eq!(a, b);
    }

    #[test]
    fn longer_input_never_estimates_fewer_tokens() {
        let short = estimate_tokens("count orders", "orders(id)");
        let long = estimate_tokens(
            "count the orders placed in the last thirty days by returning customers",
            "orders(id, amount, placed_at, customer_id), customers(id, name, first_seen)",
        );
        assert!(long > short);
    }

    #[test]
    fn empty_input_still_carries_prompt_overhead() {
        assert_eq!(estimate_tokens("", ""), PROMPT_OVERHEAD_TOKENS);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let ascii = estimate_tokens("aaaa", "");
        let cjk = estimate_tokens("订单数量", "");
        assert_eq!(ascii, cjk);
    }
}
