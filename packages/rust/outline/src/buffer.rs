//! Accumulator for the multi-line fields of the outline dialect.
//!
//! At most one buffer is active at a time. The buffer never detects its own
//! end: the builder flushes it when a line arrives that cannot belong to it.

use crate::classifier::BufferKind;

/// Contents of a flushed buffer, ready to be assigned to its owning node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Flushed {
    LearningOutcomes(Vec<String>),
    TextContent(String),
    ContestSyllabus(Vec<String>),
}

#[derive(Debug, Default)]
pub(crate) struct ScopedBuffer {
    active: Option<BufferKind>,
    lines: Vec<String>,
}

impl ScopedBuffer {
    /// Start collecting `kind`, discarding anything not yet flushed.
    pub fn start(&mut self, kind: BufferKind) {
        self.active = Some(kind);
        self.lines.clear();
    }

    pub fn active(&self) -> Option<BufferKind> {
        self.active
    }

    /// Append one line. Text keeps its formatting; list items lose a
    /// leading `- ` bullet and surrounding whitespace.
    pub fn feed(&mut self, line: &str) {
        match self.active {
            Some(BufferKind::TextContent) => self.lines.push(line.to_string()),
            Some(BufferKind::LearningOutcomes | BufferKind::ContestSyllabus) => {
                let item = line.trim();
                let item = item.strip_prefix("- ").unwrap_or(item).trim();
                self.lines.push(item.to_string());
            }
            None => {}
        }
    }

    /// Append an `Image Url:` line as markdown image syntax. Only Text Content
    /// accepts images.
    pub fn feed_image(&mut self, url: &str) -> bool {
        if self.active == Some(BufferKind::TextContent) {
            self.lines.push(format!("![Image]({url})"));
            true
        } else {
            false
        }
    }

    /// Close the active buffer and hand back its contents.
    pub fn flush(&mut self) -> Option<Flushed> {
        let kind = self.active.take()?;
        let lines = std::mem::take(&mut self.lines);

        let flushed = match kind {
            BufferKind::TextContent => Flushed::TextContent(join_text(&lines)),
            BufferKind::LearningOutcomes => Flushed::LearningOutcomes(non_empty(lines)),
            BufferKind::ContestSyllabus => Flushed::ContestSyllabus(non_empty(lines)),
        };
        Some(flushed)
    }
}

/// Newline-join, dropping blank lines at either end of the block.
fn join_text(lines: &[String]) -> String {
    let is_blank = |l: &String| l.trim().is_empty();
    let start = lines.iter().position(|l| !is_blank(l)).unwrap_or(lines.len());
    let end = lines.iter().rposition(|l| !is_blank(l)).map_or(start, |i| i + 1);
    lines[start..end].join("\n")
}

fn non_empty(lines: Vec<String>) -> Vec<String> {
    lines.into_iter().filter(|l| !l.is_empty()).collect()
}
