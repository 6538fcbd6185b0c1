use crate::domain::context::Language;

/// Picks the response locale for one message: `Zh` if the text contains at
/// least one CJK ideograph, else `En`. Per-message, not sticky per session.
pub fn detect(text: &str) -> Language {
    if text.chars().any(is_cjk_ideograph) {
        Language::Zh
    } else {
        Language::En
    }
}

fn is_cjk_ideograph(character: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&character)
}
