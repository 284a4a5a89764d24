//! Recursive separator-preference text splitter.
//!
//! Splits document text into chunks of at most `max_chars` characters,
//! preferring the coarsest separator that keeps pieces within budget:
//! paragraph breaks first, then line breaks, then sentence-final
//! punctuation, then spaces, and finally bare character boundaries.
//! Adjacent chunks share an `overlap_chars`-character tail so context is
//! preserved across chunk boundaries.

/// Separator preference order, coarsest first. An empty-separator
/// (character boundary) split is the implicit last resort.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

#[derive(Debug, Clone, Copy)]
pub struct Splitter {
    max_chars: usize,
    overlap_chars: usize,
}

impl Splitter {
    /// `overlap_chars` must be strictly smaller than `max_chars`
    /// (enforced at config load).
    pub fn new(max_chars: usize, overlap_chars: usize) -> Self {
        debug_assert!(overlap_chars < max_chars);
        Self {
            max_chars,
            overlap_chars,
        }
    }

    /// Split `text` into chunks of at most `max_chars` characters.
    /// Chunks are trimmed; empty chunks are dropped.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    }

    fn split_recursive(&self, text: &str, seps: &[&str]) -> Vec<String> {
        if char_len(text) <= self.max_chars {
            return vec![text.to_string()];
        }

        let Some((sep, finer)) = seps.split_first() else {
            return self.hard_split(text);
        };

        if !text.contains(sep) {
            return self.split_recursive(text, finer);
        }

        let parts: Vec<&str> = text.split(sep).filter(|p| !p.is_empty()).collect();

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for part in parts {
            if char_len(part) <= self.max_chars {
                fitting.push(part);
            } else {
                // Flush accumulated in-budget parts, then recurse into the
                // oversized part with the finer separators.
                if !fitting.is_empty() {
                    chunks.extend(self.merge(&fitting, sep));
                    fitting.clear();
                }
                chunks.extend(self.split_recursive(part, finer));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting, sep));
        }

        chunks
    }

    /// Greedily pack separator-delimited parts into chunks of at most
    /// `max_chars`, carrying an overlap tail of parts into the next chunk.
    fn merge(&self, parts: &[&str], sep: &str) -> Vec<String> {
        let sep_len = char_len(sep);
        let mut chunks = Vec::new();
        let mut window: std::collections::VecDeque<&str> = std::collections::VecDeque::new();
        let mut total = 0usize;

        for part in parts {
            let part_len = char_len(part);
            let join_cost = if window.is_empty() { 0 } else { sep_len };

            if total + join_cost + part_len > self.max_chars && !window.is_empty() {
                chunks.push(join(&window, sep));

                // Drop parts from the front until the retained tail fits the
                // overlap budget and leaves room for the incoming part.
                while total > self.overlap_chars
                    || (total + part_len + if window.is_empty() { 0 } else { sep_len }
                        > self.max_chars
                        && total > 0)
                {
                    let Some(first) = window.pop_front() else {
                        break;
                    };
                    total -= char_len(first) + if window.is_empty() { 0 } else { sep_len };
                }
            }

            total += part_len + if window.is_empty() { 0 } else { sep_len };
            window.push_back(part);
        }

        if !window.is_empty() {
            chunks.push(join(&window, sep));
        }

        chunks
    }

    /// Last resort: split at bare character boundaries, stepping by
    /// `max_chars - overlap_chars` so consecutive windows share an exact
    /// overlap tail.
    fn hard_split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let step = self.max_chars - self.overlap_chars;
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let end = (start + self.max_chars).min(chars.len());
            chunks.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }

        chunks
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn join(parts: &std::collections::VecDeque<&str>, sep: &str) -> String {
    parts
        .iter()
        .copied()
        .collect::<Vec<_>>()
        .join(sep)
}
