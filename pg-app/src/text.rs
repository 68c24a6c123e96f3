//! Message text helpers: whitespace normalization, mention-safe names,
//! transcript line formatting and splitting replies to the platform limit.

use chrono::{DateTime, Utc};

pub const ZERO_WIDTH_SPACE: char = '\u{200B}';
pub const UNKNOWN_AUTHOR: &str = "Unknown";
pub const CHAT_LINE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

/// Collapse every whitespace run into one space and trim the ends.
pub fn normalize_content(content: &str) -> String {
    content.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Make a display name safe to echo back: no `@` can start a live mention.
///
/// Two passes, in order: every `@` gets a zero-width space after it, then
/// every `<@` not already interrupted gets one. The first pass already covers
/// every `<@`, so the second never changes anything today.
pub fn sanitize_display_name(name: &str) -> String {
    if name.is_empty() {
        return UNKNOWN_AUTHOR.to_string();
    }
    let interrupted = name.replace('@', "@\u{200B}");
    interrupt_mention_openings(&interrupted)
}

fn interrupt_mention_openings(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut rest = name;
    while let Some(idx) = rest.find("<@") {
        let (head, tail) = rest.split_at(idx + 2);
        out.push_str(head);
        if !tail.starts_with(ZERO_WIDTH_SPACE) {
            out.push(ZERO_WIDTH_SPACE);
        }
        rest = tail;
    }
    out.push_str(rest);
    out
}

/// `[<timestamp>] <author>: <content>`; author and content must already be sanitized/normalized.
pub fn format_chat_line(created_at: DateTime<Utc>, author: &str, content: &str) -> String {
    format!(
        "[{}] {author}: {content}",
        created_at.format(CHAT_LINE_TIMESTAMP_FORMAT)
    )
}

/// Split `text` into messages of at most `max_chars` characters, breaking on
/// line boundaries. A single line longer than the limit is hard-split.
/// Blank parts are dropped.
pub fn split_for_delivery(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut parts = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;

    for line in text.lines() {
        let line_len = line.chars().count();
        if line_len > max_chars {
            flush(&mut parts, &mut current, &mut current_len);
            parts.extend(hard_split(line, max_chars));
            continue;
        }
        let needed = if current.is_empty() {
            line_len
        } else {
            current_len + 1 + line_len
        };
        if needed > max_chars {
            flush(&mut parts, &mut current, &mut current_len);
            current_len = line_len;
        } else {
            current_len = needed;
        }
        current.push(line);
    }
    flush(&mut parts, &mut current, &mut current_len);

    parts.retain(|part| !part.trim().is_empty());
    parts
}

fn flush(parts: &mut Vec<String>, current: &mut Vec<&str>, current_len: &mut usize) {
    if !current.is_empty() {
        parts.push(current.join("\n"));
        current.clear();
    }
    *current_len = 0;
}

fn hard_split(line: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    chars
        .chunks(max_chars)
        .map(|piece| piece.iter().collect())
        .collect()
}
