//! Tolerant extraction of JSON payloads from LLM chat output.
//!
//! Models wrap structured output in markdown fences or surrounding prose
//! often enough that every parsing site needs the same cleanup: find the
//! outermost object and hand that slice to serde.

/// Extract the outermost `{...}` object slice, if any.
pub fn extract_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&content[start..=end])
}
