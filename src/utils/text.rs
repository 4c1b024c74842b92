//! Text helpers shared by the pipeline and the messaging layer.

/// Maximum message length accepted by the Telegram Bot API
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Split long text into chunks of at most `limit` characters without breaking lines.
///
/// Lines keep their trailing `\n`, so concatenating the chunks gives back the
/// input. A chunk is closed as soon as the next full line would push it past
/// `limit`; a single line longer than `limit` is emitted on its own.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buf = String::new();
    let mut buf_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if !buf.is_empty() && buf_len + line_len > limit {
            chunks.push(std::mem::take(&mut buf));
            buf_len = 0;
        }
        buf.push_str(line);
        buf_len += line_len;
    }
    if !buf.is_empty() {
        chunks.push(buf);
    }
    chunks
}

/// Pull a JSON payload out of a model reply that may wrap it in a code fence.
pub fn extract_json_block(response: &str) -> &str {
    if response.contains("```json") {
        response
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .unwrap_or(response)
            .trim()
    } else if response.contains("```") {
        response
            .split("```")
            .nth(1)
            .unwrap_or(response)
            .trim()
    } else {
        response.trim()
    }
}

/// Truncate to at most `max_chars` characters, marking the cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
