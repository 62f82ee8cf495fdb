/// Format a `["user: ...", "assistant: ..."]`-style history into the single
/// string the `{chat_history}` placeholder expects.
pub fn format_history(turns: &[(String, String)]) -> String {
    turns
        .iter()
        .map(|(role, content)| format!("{role}: {content}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Trim a reply down to at most `max_sentences` sentences, splitting on
/// `.`/`!`/`?` boundaries. Keeps the handlers' length caps (§4.G) enforced
/// even when the LLM ignores the prompt's instruction.
pub fn cap_sentences(text: &str, max_sentences: usize) -> String {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            sentences.push(current.trim().to_string());
            current.clear();
            if sentences.len() == max_sentences {
                return sentences.join(" ");
            }
        }
    }
    if !current.trim().is_empty() {
        sentences.push(current.trim().to_string());
    }
    sentences.join(" ")
}

/// Currency-symbol detection used to populate `shared_context.sales_info.has_pricing`
/// and by `validate_cross_agent_info` (§4.K) to spot a reply leaking pricing
/// information from a non-Sales agent.
pub fn looks_like_pricing(text: &str) -> bool {
    text.contains('$') || text.contains("COP")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_sentences_stops_at_the_limit() {
        let text = "One. Two. Three. Four.";
        assert_eq!(cap_sentences(text, 2), "One. Two.");
    }

    #[test]
    fn cap_sentences_passes_through_short_text() {
        assert_eq!(cap_sentences("Hello there", 5), "Hello there");
    }

    #[test]
    fn pricing_detection_recognizes_both_markers() {
        assert!(looks_like_pricing("Cuesta $150.000"));
        assert!(looks_like_pricing("Cuesta 150.000 COP"));
        assert!(!looks_like_pricing("Tenemos disponibilidad mañana"));
    }
}
