//! Line source for the dispatcher, with single-line pushback.

/// One input line and its 1-based line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Line<'a> {
    pub number: usize,
    pub text: &'a str,
}

pub(crate) struct LineCursor<'a> {
    lines: std::str::Lines<'a>,
    number: usize,
    pushed_back: Option<Line<'a>>,
}

impl<'a> LineCursor<'a> {
    pub fn new(input: &'a str) -> Self {
        let input = input.strip_prefix('\u{feff}').unwrap_or(input);
        Self {
            lines: input.lines(),
            number: 0,
            pushed_back: None,
        }
    }

    /// Hand a line back so the next call to `next` yields it again.
    pub fn reprocess(&mut self, line: Line<'a>) {
        debug_assert!(self.pushed_back.is_none(), "only one line of pushback");
        self.pushed_back = Some(line);
    }
}

impl<'a> Iterator for LineCursor<'a> {
    type Item = Line<'a>;

    fn next(&mut self) -> Option<Line<'a>> {
        if let Some(line) = self.pushed_back.take() {
            return Some(line);
        }
        let text = self.lines.next()?;
        self.number += 1;
        Some(Line {
            number: self.number,
            text,
        })
    }
}
