use thiserror::Error;

/// Why a generated reply was rejected by the quality gate. The gate never
/// surfaces to the customer; a rejected reply is replaced by the templated
/// fallback and may force escalation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum QualityGuardFailure {
    #[error("reply too short: {chars} chars, minimum {minimum}")]
    TooShort { chars: usize, minimum: usize },
    #[error("reply contains low-confidence marker `{marker}`")]
    LowConfidenceMarker { marker: String },
}

/// Checks a generated analysis narrative against the gate.
pub fn check_reply_quality(
    reply: &str,
    minimum_chars: usize,
    markers: &[&str],
) -> Result<(), QualityGuardFailure> {
    let trimmed = reply.trim();
    let chars = trimmed.chars().count();
    if chars < minimum_chars {
        return Err(QualityGuardFailure::TooShort { chars, minimum: minimum_chars });
    }

    let lowered = trimmed.to_lowercase();
    if let Some(marker) = markers.iter().find(|marker| lowered.contains(&marker.to_lowercase())) {
        return Err(QualityGuardFailure::LowConfidenceMarker { marker: (*marker).to_string() });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{check_reply_quality, QualityGuardFailure};
    use crate::prompts::LOW_CONFIDENCE_MARKERS;

    #[test]
    fn short_reply_fails_the_gate() {
        let result = check_reply_quality("too short", 30, LOW_CONFIDENCE_MARKERS);
        assert!(matches!(result, Err(QualityGuardFailure::TooShort { chars: 9, minimum: 30 })));
    }

    #[test]
    fn marker_phrase_fails_the_gate_even_when_long() {
        let reply = "I cannot assess this site in detail, but here are some generic thoughts \
                     about social media marketing that may or may not apply.";
        let result = check_reply_quality(reply, 30, LOW_CONFIDENCE_MARKERS);
        assert!(matches!(result, Err(QualityGuardFailure::LowConfidenceMarker { .. })));
    }

    #[test]
    fn marker_match_is_case_insensitive() {
        let reply = "UNABLE TO reach the page, so this long answer is padding around nothing at all.";
        assert!(check_reply_quality(reply, 30, LOW_CONFIDENCE_MARKERS).is_err());
    }

    #[test]
    fn substantive_reply_passes() {
        let reply = "Strengths: strong product photos and clear pricing tiers. \
                     Weaknesses: no TikTok presence and slow page loads on mobile.";
        assert!(check_reply_quality(reply, 30, LOW_CONFIDENCE_MARKERS).is_ok());
    }
}
