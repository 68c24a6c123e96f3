//! Greedy, order-preserving batching of transcript lines under a character budget.

pub const DEFAULT_MAX_CHUNK_CHARS: usize = 12_000;
pub const LINE_SEPARATOR: &str = "\n";

/// Contiguous run of transcript lines. `size` counts every line plus one separator each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    lines: Vec<String>,
    size: usize,
}

impl Chunk {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn text(&self) -> String {
        self.lines.join(LINE_SEPARATOR)
    }
}

/// Lengths are measured in characters. A line that alone exceeds `max_chars`
/// is never split; it ends up in a chunk of its own (or leading one, when the
/// current chunk is empty). Empty input yields no chunks.
pub fn chunk_lines<S: AsRef<str>>(lines: &[S], max_chars: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_len = 0usize;

    for line in lines {
        let line = line.as_ref();
        let cost = line.chars().count() + 1;
        if current_len + cost > max_chars && !current.is_empty() {
            chunks.push(Chunk {
                lines: std::mem::take(&mut current),
                size: current_len,
            });
            current_len = 0;
        }
        current.push(line.to_string());
        current_len += cost;
    }

    if !current.is_empty() {
        chunks.push(Chunk {
            lines: current,
            size: current_len,
        });
    }

    tracing::debug!(
        line_count = lines.len(),
        chunk_count = chunks.len(),
        max_chars,
        "transcript chunked"
    );
    chunks
}
