//! Normalization of raw LLM output.
//!
//! Models often wrap SQL or JSON in markdown fences even when told not to. Everything the
//! pipeline parses goes through [`strip_code_fences`] first.
//!
//! Grammar of what is removed, in order:
//! - surrounding whitespace;
//! - an opening fence: three backticks, then either a language tag (`[A-Za-z0-9_+-]*`)
//!   ending its own line, or the inline tag `sql`/`json` (any case), or nothing;
//! - a closing fence: three backticks at the very end, with any whitespace before it;
//! - whitespace left at either end after the fences are gone.
//!
//! Fences in the middle of the text are left alone.

use regex::Regex;
use std::sync::OnceLock;

fn opening_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^```(?:[A-Za-z0-9_+-]*[ \t]*\r?\n|(?i:sql|json)\b)?")
            .expect("opening fence pattern is valid")
    })
}

fn closing_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*```$").expect("closing fence pattern is valid"))
}

/// Removes surrounding markdown code fences and whitespace from an LLM reply.
pub fn strip_code_fences(text: &str) -> String {
    let text = text.trim();
    let text = opening_fence().replace(text, "");
    let text = closing_fence().replace(text.trim_start(), "");
    text.trim().to_string()
}
