use std::time::Duration;

/// Delivery and retry policy for one reply. Delays live here, not as
/// hard-coded sleeps, so tests can run against a fake clock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PacingPolicy {
    /// Hard cap on discrete messages a recipient sees for one reply.
    pub max_chunks: usize,
    /// Wait between consecutive chunk sends.
    pub inter_chunk_delay: Duration,
    /// Wait before the single profile-fetch retry.
    pub fetch_retry_delay: Duration,
    /// Initial attempt plus retries for the profile fetch.
    pub fetch_max_attempts: u32,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            max_chunks: 3,
            inter_chunk_delay: Duration::from_millis(1500),
            fetch_retry_delay: Duration::from_millis(2000),
            fetch_max_attempts: 2,
        }
    }
}

/// Splits a reply on blank-line boundaries and regroups the paragraphs into
/// at most `max_chunks` ordered chunks.
///
/// With `p` paragraphs and cap `K`, group sizes are `p/K` or `p/K + 1`, the
/// larger groups first, original paragraph order preserved throughout.
/// Fewer paragraphs than the cap are returned as-is, never padded.
pub fn split_into_chunks(reply: &str, max_chunks: usize) -> Vec<String> {
    let paragraphs: Vec<&str> = reply
        .split("\n\n")
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .collect();

    if paragraphs.is_empty() {
        let trimmed = reply.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        return vec![trimmed.to_string()];
    }

    if max_chunks == 0 || paragraphs.len() <= max_chunks {
        return paragraphs.into_iter().map(str::to_string).collect();
    }

    let base = paragraphs.len() / max_chunks;
    let remainder = paragraphs.len() % max_chunks;

    let mut chunks = Vec::with_capacity(max_chunks);
    let mut cursor = 0;
    for group_index in 0..max_chunks {
        let size = if group_index < remainder { base + 1 } else { base };
        let group = &paragraphs[cursor..cursor + size];
        chunks.push(group.join("\n\n"));
        cursor += size;
    }
    chunks
}
