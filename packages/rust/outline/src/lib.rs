//! Parser for the course outline dialect.
//!
//! Turns a line-oriented outline (`Module N:` / `Topic N.M:` / `Class N.M.K:`
//! markers, `Key: value` directives and multi-line blocks) into a
//! [`Course`] tree. The whole document is parsed in memory in one pass:
//!
//! 1. each line is classified ([`classifier`])
//! 2. the builder routes it to the open scope, buffering multi-line fields
//! 3. a line that ends a buffer is pushed back and dispatched again
//!
//! [`validate`] checks required fields afterwards and [`render_outline`]
//! writes a document back out in the same dialect.

mod buffer;
mod builder;
pub mod classifier;
mod cursor;
mod render;
mod validate;

use std::collections::HashMap;

use tracing::{info, instrument};

use curriculum_shared::{Course, ParseOptions, Result, ScratchId};

use crate::builder::{DocumentBuilder, Step};
use crate::cursor::LineCursor;

pub use render::render_outline;
pub use validate::validate;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A parsed document plus the source positions of its nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outline {
    pub course: Course,
    pub source_map: SourceMap,
}

/// Line numbers (1-based) of each node's structural marker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMap {
    markers: HashMap<ScratchId, usize>,
    /// Line of the last `Course Title:` (or course-level `Title:`) directive.
    pub course_title_line: Option<usize>,
}

impl SourceMap {
    pub(crate) fn record(&mut self, id: ScratchId, line: usize) {
        self.markers.insert(id, line);
    }

    pub fn line_of(&self, id: ScratchId) -> Option<usize> {
        self.markers.get(&id).copied()
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse an outline document into a course tree.
///
/// Structural problems abort with `MalformedDocument` in strict mode; in
/// lenient mode orphaned nodes are dropped with a warning.
#[instrument(skip_all, fields(bytes = input.len(), strict = options.strict))]
pub fn parse_outline(input: &str, options: &ParseOptions) -> Result<Outline> {
    let mut cursor = LineCursor::new(input);
    let mut builder = DocumentBuilder::new(options);

    while let Some(line) = cursor.next() {
        if builder.step(line.number, line.text)? == Step::Reprocess {
            cursor.reprocess(line);
        }
    }

    let outline = builder.finish()?;

    info!(
        title = %outline.course.fields.title,
        modules = outline.course.modules.len(),
        classes = outline.course.classes().count(),
        "outline parsed"
    );

    Ok(outline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use curriculum_shared::{ContentType, CurriculumError};
    use pretty_assertions::assert_eq;

    fn parse(input: &str) -> Outline {
        parse_outline(input, &ParseOptions::default()).expect("parse outline")
    }

    #[test]
    fn single_text_class() {
        let outline = parse(
            "Module 1:\nTopic 1.1:\nClass 1.1.1:\nContent Type: text\nText Content:\nline1\nline2\n",
        );
        let modules = &outline.course.modules;
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].fields.order, 1);
        assert_eq!(modules[0].topics.len(), 1);
        assert_eq!(modules[0].topics[0].fields.order, 1);

        let classes = &modules[0].topics[0].classes;
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].fields.order, 1);
        assert_eq!(classes[0].fields.content_type, ContentType::Text);
        assert_eq!(classes[0].fields.text_content.as_deref(), Some("line1\nline2"));
    }

    #[test]
    fn syllabus_followed_by_class_marker() {
        let outline = parse(
            "Module 1:\nTopic 1.1:\nClass 1.1.1:\nContest Syllabus:\n- Topic A\n- Topic B\nClass 1.1.2:\n",
        );
        let classes = &outline.course.modules[0].topics[0].classes;
        assert_eq!(classes.len(), 2);
        assert_eq!(
            classes[0].fields.contest_syllabus,
            Some(vec!["Topic A".to_string(), "Topic B".to_string()])
        );
        assert_eq!(classes[1].fields.order, 2);
        assert_eq!(classes[1].fields.contest_syllabus, None);
    }

    #[test]
    fn text_block_ends_at_next_module_marker() {
        let outline = parse(
            "Module 1:\nTopic 1.1:\nClass 1.1.1:\nText Content:\nfirst\n\nsecond\nModule 2:\nTitle: Next\n",
        );
        let modules = &outline.course.modules;
        assert_eq!(modules.len(), 2);
        assert_eq!(
            modules[0].topics[0].classes[0].fields.text_content.as_deref(),
            Some("first\n\nsecond")
        );
        assert_eq!(modules[1].fields.order, 2);
        assert_eq!(modules[1].fields.title, "Next");
    }

    #[test]
    fn full_course_fixture() {
        let content = std::fs::read_to_string("../../../fixtures/outline/full-course.txt")
            .expect("read fixture");
        let outline = parse(&content);
        let course = &outline.course;

        assert_eq!(course.id.as_deref(), Some("backend-foundations"));
        assert_eq!(course.fields.title, "Backend Foundations");
        assert_eq!(course.fields.course_type, "role-specific");
        assert_eq!(course.fields.role.as_deref(), Some("Backend Engineer"));
        assert_eq!(course.modules.len(), 2);

        let http = &course.modules[0];
        assert_eq!(
            http.fields.learning_outcomes,
            vec!["Describe the request/response cycle", "Pick the right status code"]
        );
        assert_eq!(http.topics.len(), 2);

        let video = &http.topics[0].classes[0].fields;
        assert_eq!(video.content_type, ContentType::Video);
        assert_eq!(video.duration_secs, 540);

        let reading = &http.topics[0].classes[1].fields;
        assert_eq!(
            reading.text_content.as_deref(),
            Some(
                "Headers are **case-insensitive** key/value pairs.\n\n\
                 ![Image](https://images.example.com/headers.png)\n\
                 Check the `Content-Type` header first."
            )
        );

        let quiz = &http.topics[1].classes[0].fields;
        assert_eq!(quiz.contest_questions, Some(6));
        assert_eq!(quiz.duration_secs, 1800);
        assert_eq!(
            quiz.contest_syllabus,
            Some(vec!["Methods".to_string(), "Status codes".to_string()])
        );

        let persistence = &course.modules[1];
        assert_eq!(persistence.fields.order, 5);
        assert_eq!(
            persistence.topics[0].classes[0].fields.description.as_deref(),
            Some("Filtering and projection.")
        );

        validate(&outline).expect("fixture is valid");
    }

    #[test]
    fn orphan_topic_fixture() {
        let content = std::fs::read_to_string("../../../fixtures/outline/orphan-topic.txt")
            .expect("read fixture");

        let err = parse_outline(&content, &ParseOptions::default()).expect_err("strict");
        assert!(matches!(err, CurriculumError::MalformedDocument { line: 3, .. }));

        let lenient = ParseOptions {
            strict: false,
            ..ParseOptions::default()
        };
        let outline = parse_outline(&content, &lenient).expect("lenient");
        assert_eq!(outline.course.modules.len(), 1);
        assert!(outline.course.modules[0].topics.is_empty());
        assert_eq!(outline.course.modules[0].fields.title, "Late module");
    }

    #[test]
    fn parsing_is_deterministic() {
        let content = std::fs::read_to_string("../../../fixtures/outline/full-course.txt")
            .expect("read fixture");
        assert_eq!(parse(&content), parse(&content));
    }

    #[test]
    fn duplicate_orders_are_kept_by_the_parser() {
        let outline = parse("Module 1:\nTopic 1.1:\nClass 1.1.1:\nTitle: A\nClass 1.1.1:\nTitle: B\n");
        let classes = &outline.course.modules[0].topics[0].classes;
        assert_eq!(classes.len(), 2);
        assert_eq!(classes[1].fields.title, "B");
    }
}
