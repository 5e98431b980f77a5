//! Line classification for the course outline dialect.
//!
//! Each input line is categorized without looking at any parser state:
//! - `Key: value` metadata directives for a fixed set of keys
//! - `Module N:` / `Topic N.M:` / `Class N.M.K:` structural markers
//! - `Learning Outcomes:` / `Text Content:` / `Contest Syllabus:` buffer starts
//! - `Image Url: <url>` lines (meaningful only inside Text Content)
//! - everything else, as plain text
//!
//! Which scope a directive applies to is decided by the builder, not here.

use std::sync::LazyLock;

use regex::Regex;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The recognized metadata directive keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKey {
    CourseType,
    Role,
    Skill,
    Company,
    CourseTitle,
    CourseId,
    CourseDescription,
    /// Context-sensitive: Course, Module, Topic or Class.
    Title,
    /// Context-sensitive: Course, Module or Class.
    Description,
    /// Context-sensitive: Module, Topic or Class.
    Order,
    ContentType,
    Duration,
    VideoUrl,
    ContestUrl,
    ContestQuestions,
}

impl DirectiveKey {
    fn from_label(label: &str) -> Option<Self> {
        let key = match label.to_ascii_lowercase().as_str() {
            "course type" => Self::CourseType,
            "role" => Self::Role,
            "skill" => Self::Skill,
            "company" => Self::Company,
            "course title" => Self::CourseTitle,
            "course id" => Self::CourseId,
            "course description" => Self::CourseDescription,
            "title" => Self::Title,
            "description" => Self::Description,
            "order" => Self::Order,
            "content type" => Self::ContentType,
            "duration" => Self::Duration,
            "video url" => Self::VideoUrl,
            "contest url" => Self::ContestUrl,
            "contest questions" => Self::ContestQuestions,
            _ => return None,
        };
        Some(key)
    }

    /// Canonical spelling, as written by the renderer.
    pub fn label(&self) -> &'static str {
        match self {
            Self::CourseType => "Course Type",
            Self::Role => "Role",
            Self::Skill => "Skill",
            Self::Company => "Company",
            Self::CourseTitle => "Course Title",
            Self::CourseId => "Course ID",
            Self::CourseDescription => "Course Description",
            Self::Title => "Title",
            Self::Description => "Description",
            Self::Order => "Order",
            Self::ContentType => "Content Type",
            Self::Duration => "Duration",
            Self::VideoUrl => "Video URL",
            Self::ContestUrl => "Contest URL",
            Self::ContestQuestions => "Contest Questions",
        }
    }

    /// Directives that only make sense inside a Class.
    pub fn is_class_only(&self) -> bool {
        matches!(
            self,
            Self::ContentType
                | Self::Duration
                | Self::VideoUrl
                | Self::ContestUrl
                | Self::ContestQuestions
        )
    }

    /// Directives that always target the Course, whatever scope is open.
    pub fn is_course_only(&self) -> bool {
        matches!(
            self,
            Self::CourseType
                | Self::Role
                | Self::Skill
                | Self::Company
                | Self::CourseTitle
                | Self::CourseId
                | Self::CourseDescription
        )
    }
}

/// A structural marker with its positional numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionMarker {
    Module { module: u32 },
    Topic { module: u32, topic: u32 },
    Class { module: u32, topic: u32, class: u32 },
}

impl SectionMarker {
    /// The sibling `order` this marker assigns: its last number.
    pub fn order(&self) -> u32 {
        match *self {
            Self::Module { module } => module,
            Self::Topic { topic, .. } => topic,
            Self::Class { class, .. } => class,
        }
    }
}

/// The multi-line fields that are collected by a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    LearningOutcomes,
    TextContent,
    ContestSyllabus,
}

/// Classification of a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind<'a> {
    Directive { key: DirectiveKey, value: &'a str },
    SectionStart(SectionMarker),
    BufferStart(BufferKind),
    Image { url: &'a str },
    /// Anything else; carries the untrimmed line.
    Plain(&'a str),
}

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

static MODULE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Module\s+(\d{1,9})\s*:?$").expect("module regex"));

static TOPIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Topic\s+(\d{1,9})\.(\d{1,9})\s*:?$").expect("topic regex")
});

static CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Class\s+(\d{1,9})\.(\d{1,9})\.(\d{1,9})\s*:?$").expect("class regex")
});

static OUTCOMES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Learning\s+Outcomes\s*:$").expect("outcomes regex"));

static TEXT_CONTENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Text\s+Content\s*:?$").expect("text content regex"));

static SYLLABUS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^Contest\s+Syllabus\s*:?$").expect("contest syllabus regex")
});

static IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Image\s+Url\s*:\s*(.*)$").expect("image regex"));

/// `Label: value`, where the label is two words at most. The label is
/// checked against [`DirectiveKey`] afterwards.
static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z]+(?:[ \t]+[A-Za-z]+)?)[ \t]*:[ \t]*(.*)$").expect("directive regex")
});

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Classify one line. Pure; matching is done on the trimmed line.
pub fn classify(line: &str) -> LineKind<'_> {
    let trimmed = line.trim();

    if let Some(marker) = section_marker(trimmed) {
        return LineKind::SectionStart(marker);
    }

    if OUTCOMES_RE.is_match(trimmed) {
        return LineKind::BufferStart(BufferKind::LearningOutcomes);
    }
    if TEXT_CONTENT_RE.is_match(trimmed) {
        return LineKind::BufferStart(BufferKind::TextContent);
    }
    if SYLLABUS_RE.is_match(trimmed) {
        return LineKind::BufferStart(BufferKind::ContestSyllabus);
    }

    if let Some(caps) = IMAGE_RE.captures(trimmed) {
        let url = caps.get(1).map_or("", |m| m.as_str().trim());
        return LineKind::Image { url };
    }

    if let Some(caps) = DIRECTIVE_RE.captures(trimmed) {
        let label = collapse_whitespace(&caps[1]);
        if let Some(key) = DirectiveKey::from_label(&label) {
            let value = caps.get(2).map_or("", |m| m.as_str().trim());
            return LineKind::Directive { key, value };
        }
    }

    LineKind::Plain(line)
}

fn section_marker(trimmed: &str) -> Option<SectionMarker> {
    if let Some(caps) = MODULE_RE.captures(trimmed) {
        return Some(SectionMarker::Module {
            module: caps[1].parse().ok()?,
        });
    }
    if let Some(caps) = TOPIC_RE.captures(trimmed) {
        return Some(SectionMarker::Topic {
            module: caps[1].parse().ok()?,
            topic: caps[2].parse().ok()?,
        });
    }
    if let Some(caps) = CLASS_RE.captures(trimmed) {
        return Some(SectionMarker::Class {
            module: caps[1].parse().ok()?,
            topic: caps[2].parse().ok()?,
            class: caps[3].parse().ok()?,
        });
    }
    None
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
