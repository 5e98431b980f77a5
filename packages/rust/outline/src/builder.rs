//! Document builder: the state machine that turns classified lines into a
//! Course → Module → Topic → Class tree.
//!
//! The builder owns an explicit scope stack (open Module, Topic, Class) and a
//! single [`ScopedBuffer`]. A node is sealed into its parent only when a
//! sibling or ancestor marker arrives, or at end of input.

use tracing::{debug, warn};

use curriculum_shared::{
    Class, ClassFields, ContentType, Course, CurriculumError, Module, ModuleFields,
    ParseOptions, Result, ScratchId, Topic, TopicFields,
};

use crate::buffer::{Flushed, ScopedBuffer};
use crate::classifier::{BufferKind, DirectiveKey, LineKind, SectionMarker, classify};
use crate::{Outline, SourceMap};

// ---------------------------------------------------------------------------
// Scope stack & directive routing
// ---------------------------------------------------------------------------

/// Innermost open scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scope {
    Course,
    Module,
    Topic,
    Class,
}

/// Node a directive value is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldTarget {
    Course,
    Module,
    Topic,
    Class,
    Ignored,
}

/// Decide which node a directive belongs to, given the innermost open scope.
///
/// Course-prefixed keys always go to the Course; Class-only keys need an open
/// Class; `Title`/`Description`/`Order` go to the innermost open scope.
pub(crate) fn route_labeled_field(key: DirectiveKey, scope: Scope) -> FieldTarget {
    if key.is_course_only() {
        return FieldTarget::Course;
    }
    if key.is_class_only() {
        return match scope {
            Scope::Class => FieldTarget::Class,
            _ => FieldTarget::Ignored,
        };
    }
    match (key, scope) {
        (DirectiveKey::Order, Scope::Course) => FieldTarget::Ignored,
        // Topics carry no description.
        (DirectiveKey::Description, Scope::Topic) => FieldTarget::Ignored,
        (_, Scope::Course) => FieldTarget::Course,
        (_, Scope::Module) => FieldTarget::Module,
        (_, Scope::Topic) => FieldTarget::Topic,
        (_, Scope::Class) => FieldTarget::Class,
    }
}

#[derive(Debug, Default)]
struct ScopeStack {
    module: Option<Module>,
    topic: Option<Topic>,
    class: Option<Class>,
}

impl ScopeStack {
    fn innermost(&self) -> Scope {
        if self.class.is_some() {
            Scope::Class
        } else if self.topic.is_some() {
            Scope::Topic
        } else if self.module.is_some() {
            Scope::Module
        } else {
            Scope::Course
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Outcome of feeding one line to the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Consumed,
    /// The line closed the active buffer and must be dispatched again.
    Reprocess,
}

pub(crate) struct DocumentBuilder<'o> {
    options: &'o ParseOptions,
    course: Course,
    scope: ScopeStack,
    buffer: ScopedBuffer,
    source_map: SourceMap,
    next_scratch: u32,
}

impl<'o> DocumentBuilder<'o> {
    pub fn new(options: &'o ParseOptions) -> Self {
        Self {
            options,
            course: Course::default(),
            scope: ScopeStack::default(),
            buffer: ScopedBuffer::default(),
            source_map: SourceMap::default(),
            next_scratch: 0,
        }
    }

    /// Dispatch one line.
    pub fn step(&mut self, line_no: usize, line: &str) -> Result<Step> {
        let kind = classify(line);

        if let Some(active) = self.buffer.active() {
            match kind {
                LineKind::Plain(text) => {
                    self.buffer.feed(text);
                    return Ok(Step::Consumed);
                }
                LineKind::Image { url } => {
                    if !self.buffer.feed_image(url) {
                        debug!(line_no, ?active, "image line outside text content ignored");
                    }
                    return Ok(Step::Consumed);
                }
                _ => {
                    debug!(line_no, ?active, "buffer closed by directive line");
                    self.flush_buffer();
                    return Ok(Step::Reprocess);
                }
            }
        }

        match kind {
            LineKind::SectionStart(marker) => self.open_section(line_no, marker)?,
            LineKind::BufferStart(kind) => self.start_buffer(line_no, kind)?,
            LineKind::Directive { key, value } => self.apply_directive(line_no, key, value)?,
            LineKind::Image { .. } => {
                debug!(line_no, "image line outside text content ignored");
            }
            LineKind::Plain(text) => {
                if !text.trim().is_empty() {
                    debug!(line_no, "stray text outside any buffer ignored");
                }
            }
        }
        Ok(Step::Consumed)
    }

    /// Flush and seal everything still open.
    pub fn finish(mut self) -> Result<Outline> {
        self.flush_buffer();
        self.seal_class();
        self.seal_topic();
        self.seal_module();
        Ok(Outline {
            course: self.course,
            source_map: self.source_map,
        })
    }

    // -- structure ----------------------------------------------------------

    fn open_section(&mut self, line_no: usize, marker: SectionMarker) -> Result<()> {
        match marker {
            SectionMarker::Module { module } => {
                self.seal_class();
                self.seal_topic();
                self.seal_module();
                let scratch_id = self.scratch(line_no);
                self.scope.module = Some(Module {
                    scratch_id,
                    fields: ModuleFields {
                        order: module,
                        ..Default::default()
                    },
                    topics: Vec::new(),
                });
            }
            SectionMarker::Topic { module, topic } => {
                match &self.scope.module {
                    None => self.structural(
                        line_no,
                        format!("Topic {module}.{topic} has no open Module"),
                    )?,
                    Some(open) if open.fields.order != module => {
                        debug!(line_no, module, open = open.fields.order, "topic numbered under a different module");
                    }
                    Some(_) => {}
                }
                self.seal_class();
                self.seal_topic();
                let scratch_id = self.scratch(line_no);
                self.scope.topic = Some(Topic {
                    scratch_id,
                    fields: TopicFields {
                        title: String::new(),
                        order: topic,
                    },
                    classes: Vec::new(),
                });
            }
            SectionMarker::Class {
                module,
                topic,
                class,
            } => {
                if self.scope.topic.is_none() {
                    self.structural(
                        line_no,
                        format!("Class {module}.{topic}.{class} has no open Topic"),
                    )?;
                }
                self.seal_class();
                let scratch_id = self.scratch(line_no);
                self.scope.class = Some(Class {
                    scratch_id,
                    fields: ClassFields::new(
                        class,
                        self.options.default_content_type,
                        self.options.default_duration_secs,
                    ),
                });
            }
        }
        Ok(())
    }

    fn scratch(&mut self, line_no: usize) -> ScratchId {
        self.next_scratch += 1;
        let id = ScratchId(self.next_scratch);
        self.source_map.record(id, line_no);
        id
    }

    fn seal_class(&mut self) {
        let Some(class) = self.scope.class.take() else {
            return;
        };
        match self.scope.topic.as_mut() {
            Some(topic) => topic.classes.push(class),
            None => warn!(
                line = self.source_map.line_of(class.scratch_id),
                order = class.fields.order,
                "dropping class with no open topic"
            ),
        }
    }

    fn seal_topic(&mut self) {
        let Some(topic) = self.scope.topic.take() else {
            return;
        };
        match self.scope.module.as_mut() {
            Some(module) => module.topics.push(topic),
            None => warn!(
                line = self.source_map.line_of(topic.scratch_id),
                order = topic.fields.order,
                "dropping topic with no open module"
            ),
        }
    }

    fn seal_module(&mut self) {
        if let Some(module) = self.scope.module.take() {
            self.course.modules.push(module);
        }
    }

    // -- buffers ------------------------------------------------------------

    fn start_buffer(&mut self, line_no: usize, kind: BufferKind) -> Result<()> {
        let allowed = match kind {
            BufferKind::LearningOutcomes => self.scope.innermost() == Scope::Module,
            BufferKind::TextContent | BufferKind::ContestSyllabus => self.scope.class.is_some(),
        };

        if allowed {
            self.buffer.start(kind);
            return Ok(());
        }

        let reason = match kind {
            BufferKind::LearningOutcomes => "Learning Outcomes outside a Module",
            BufferKind::TextContent => "Text Content outside a Class",
            BufferKind::ContestSyllabus => "Contest Syllabus outside a Class",
        };
        self.structural(line_no, reason)
    }

    fn flush_buffer(&mut self) {
        let Some(flushed) = self.buffer.flush() else {
            return;
        };
        match flushed {
            Flushed::LearningOutcomes(items) => {
                if let Some(module) = self.scope.module.as_mut() {
                    module.fields.learning_outcomes = items;
                }
            }
            Flushed::TextContent(text) => {
                if let Some(class) = self.scope.class.as_mut() {
                    class.fields.text_content = Some(text);
                }
            }
            Flushed::ContestSyllabus(items) => {
                if let Some(class) = self.scope.class.as_mut() {
                    class.fields.contest_syllabus = Some(items);
                }
            }
        }
    }

    // -- directives ---------------------------------------------------------

    fn apply_directive(&mut self, line_no: usize, key: DirectiveKey, value: &str) -> Result<()> {
        let target = route_labeled_field(key, self.scope.innermost());
        debug!(line_no, ?key, ?target, "routing directive");

        match target {
            FieldTarget::Course => self.apply_course(line_no, key, value),
            FieldTarget::Module => self.apply_module(line_no, key, value)?,
            FieldTarget::Topic => self.apply_topic(line_no, key, value)?,
            FieldTarget::Class => self.apply_class(line_no, key, value)?,
            FieldTarget::Ignored => {}
        }
        Ok(())
    }

    fn apply_course(&mut self, line_no: usize, key: DirectiveKey, value: &str) {
        let course = &mut self.course;
        match key {
            DirectiveKey::CourseType => course.fields.course_type = value.to_string(),
            DirectiveKey::Role => course.fields.role = non_empty(value),
            DirectiveKey::Skill => course.fields.skill = non_empty(value),
            DirectiveKey::Company => course.fields.company_name = non_empty(value),
            DirectiveKey::CourseId => course.id = non_empty(value),
            DirectiveKey::CourseTitle | DirectiveKey::Title => {
                course.fields.title = value.to_string();
                self.source_map.course_title_line = Some(line_no);
            }
            DirectiveKey::CourseDescription | DirectiveKey::Description => {
                course.fields.description = value.to_string();
            }
            _ => {}
        }
    }

    fn apply_module(&mut self, line_no: usize, key: DirectiveKey, value: &str) -> Result<()> {
        let order = match key {
            DirectiveKey::Order => self.parse_number(line_no, "Order", value)?,
            _ => None,
        };
        let Some(module) = self.scope.module.as_mut() else {
            return Ok(());
        };
        match key {
            DirectiveKey::Title => module.fields.title = value.to_string(),
            DirectiveKey::Description => module.fields.description = value.to_string(),
            DirectiveKey::Order => {
                if let Some(order) = order {
                    module.fields.order = order;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn apply_topic(&mut self, line_no: usize, key: DirectiveKey, value: &str) -> Result<()> {
        let order = match key {
            DirectiveKey::Order => self.parse_number(line_no, "Order", value)?,
            _ => None,
        };
        let Some(topic) = self.scope.topic.as_mut() else {
            return Ok(());
        };
        match key {
            DirectiveKey::Title => topic.fields.title = value.to_string(),
            DirectiveKey::Order => {
                if let Some(order) = order {
                    topic.fields.order = order;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn apply_class(&mut self, line_no: usize, key: DirectiveKey, value: &str) -> Result<()> {
        let number = match key {
            DirectiveKey::Order => self.parse_number(line_no, "Order", value)?,
            DirectiveKey::Duration => self.parse_number(line_no, "Duration", value)?,
            DirectiveKey::ContestQuestions => {
                self.parse_number(line_no, "Contest Questions", value)?
            }
            _ => None,
        };
        let content_type = match key {
            DirectiveKey::ContentType => match value.parse::<ContentType>() {
                Ok(ct) => Some(ct),
                Err(message) => {
                    self.invalid_value(line_no, message)?;
                    None
                }
            },
            _ => None,
        };

        let Some(class) = self.scope.class.as_mut() else {
            return Ok(());
        };
        let fields = &mut class.fields;
        match key {
            DirectiveKey::Title => fields.title = value.to_string(),
            DirectiveKey::Description => fields.description = non_empty(value),
            DirectiveKey::VideoUrl => fields.video_url = non_empty(value),
            DirectiveKey::ContestUrl => fields.contest_url = non_empty(value),
            DirectiveKey::ContentType => {
                if let Some(ct) = content_type {
                    fields.content_type = ct;
                }
            }
            DirectiveKey::Order => {
                if let Some(n) = number {
                    fields.order = n;
                }
            }
            DirectiveKey::Duration => {
                if let Some(n) = number {
                    fields.duration_secs = n;
                }
            }
            DirectiveKey::ContestQuestions => fields.contest_questions = number,
            _ => {}
        }
        Ok(())
    }

    // -- error policy -------------------------------------------------------

    /// Strict mode rejects broken structure; lenient mode warns and carries on.
    fn structural(&self, line_no: usize, reason: impl Into<String>) -> Result<()> {
        let reason = reason.into();
        if self.options.strict {
            return Err(CurriculumError::malformed(line_no, reason));
        }
        warn!(line = line_no, %reason, "malformed structure, continuing");
        Ok(())
    }

    fn invalid_value(&self, line_no: usize, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        if self.options.strict {
            return Err(CurriculumError::validation(Some(line_no), message));
        }
        warn!(line = line_no, %message, "invalid directive value ignored");
        Ok(())
    }

    fn parse_number(&self, line_no: usize, label: &str, value: &str) -> Result<Option<u32>> {
        match value.trim().parse::<u32>() {
            Ok(n) => Ok(Some(n)),
            Err(_) => {
                self.invalid_value(
                    line_no,
                    format!("{label} must be a non-negative integer, got '{value}'"),
                )?;
                Ok(None)
            }
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
