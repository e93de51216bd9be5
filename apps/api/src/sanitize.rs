//! Text handling for knowledge entries.
//!
//! Stored text is escaped once at write time so no renderer downstream can
//! interpret it as markup. Lookups escape the incoming question the same way
//! before comparing, which keeps exact matching on the raw text working.

/// HTML-escapes `& < > " '`. Already-escaped input is escaped again.
pub fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Lower-cases and trims. No other folding.
pub fn normalize_question(question: &str) -> String {
    question.trim().to_lowercase()
}

/// The comparison key for a raw, unescaped question.
pub fn question_key(raw: &str) -> String {
    normalize_question(&escape_markup(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_neutralizes_script_tags() {
        assert_eq!(
            escape_markup("<script>alert('x')</script>"),
            "&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"
        );
    }

    #[test]
    fn test_escape_template_syntax_survives_visually() {
        // braces are inert once the angle brackets and quotes are escaped
        assert_eq!(escape_markup("{{ price }} & \"tax\""), "{{ price }} &amp; &#34;tax&#34;");
    }

    #[test]
    fn test_escape_is_not_idempotent() {
        assert_eq!(escape_markup("&amp;"), "&amp;amp;");
    }

    #[test]
    fn test_normalize_trims_and_lowercases() {
        assert_eq!(normalize_question("  What Are Your Hours?\n"), "what are your hours?");
    }

    #[test]
    fn test_question_key_matches_stored_form() {
        let stored = escape_markup("Do you have <b>parking</b>?");
        assert_eq!(
            normalize_question(&stored),
            question_key("  do you have <B>PARKING</B>?")
        );
    }
}
