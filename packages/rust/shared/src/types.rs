//! Core domain types: the parsed course document and the persisted course tree.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Duration assigned to a Class that carries no `Duration:` directive.
pub const DEFAULT_CLASS_DURATION_SECS: u32 = 300;

// ---------------------------------------------------------------------------
// ContentType
// ---------------------------------------------------------------------------

/// What a Class delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Video,
    Text,
    Contest,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Text => "text",
            Self::Contest => "contest",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(Self::Video),
            "text" => Ok(Self::Text),
            "contest" => Ok(Self::Contest),
            other => Err(format!(
                "unknown content type '{other}': expected video, text, or contest"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// ScratchId
// ---------------------------------------------------------------------------

/// Parse-local node identifier, unique within one parsed document.
///
/// Assigned in marker order. Never persisted: durable identifiers come from
/// the persistence adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScratchId(pub u32);

impl fmt::Display for ScratchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Field sets
// ---------------------------------------------------------------------------

/// Course-level fields, always overwritten on re-import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseFields {
    pub title: String,
    pub description: String,
    /// Free-form category ("role-specific", "skill-based", "company-specific", ...).
    pub course_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleFields {
    pub title: String,
    pub description: String,
    pub order: u32,
    #[serde(default)]
    pub learning_outcomes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicFields {
    pub title: String,
    pub order: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassFields {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub content_type: ContentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    /// Raw markdown body; rendered by an external renderer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contest_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contest_questions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contest_syllabus: Option<Vec<String>>,
    pub duration_secs: u32,
    pub order: u32,
}

impl ClassFields {
    /// Fresh fields for a Class opened by a `Class X.Y.Z` marker.
    pub fn new(order: u32, content_type: ContentType, duration_secs: u32) -> Self {
        Self {
            title: String::new(),
            description: None,
            content_type,
            video_url: None,
            text_content: None,
            contest_url: None,
            contest_questions: None,
            contest_syllabus: None,
            duration_secs,
            order,
        }
    }
}

/// SHA-256 over the canonical JSON form of a field set.
///
/// Stored next to each persisted node so a re-import can tell a real change
/// from a no-op update.
pub trait Fingerprint: Serialize {
    fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        format!("{:x}", Sha256::digest(&bytes))
    }
}

impl Fingerprint for CourseFields {}
impl Fingerprint for ModuleFields {}
impl Fingerprint for TopicFields {}
impl Fingerprint for ClassFields {}

// ---------------------------------------------------------------------------
// Parsed document
// ---------------------------------------------------------------------------

/// A course as parsed from an outline document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// Value of the `Course ID:` directive, if present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub fields: CourseFields,
    pub modules: Vec<Module>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub scratch_id: ScratchId,
    pub fields: ModuleFields,
    pub topics: Vec<Topic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub scratch_id: ScratchId,
    pub fields: TopicFields,
    pub classes: Vec<Class>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub scratch_id: ScratchId,
    pub fields: ClassFields,
}

impl Course {
    /// Iterate over every Class in document order.
    pub fn classes(&self) -> impl Iterator<Item = &Class> {
        self.modules
            .iter()
            .flat_map(|m| m.topics.iter())
            .flat_map(|t| t.classes.iter())
    }
}

// ---------------------------------------------------------------------------
// Persisted tree
// ---------------------------------------------------------------------------

/// A course as currently stored by the persistence adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedCourse {
    pub id: String,
    pub fields: CourseFields,
    pub modules: Vec<PersistedModule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedModule {
    pub id: String,
    pub fields: ModuleFields,
    pub content_hash: String,
    pub topics: Vec<PersistedTopic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedTopic {
    pub id: String,
    pub fields: TopicFields,
    pub content_hash: String,
    pub classes: Vec<PersistedClass>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedClass {
    pub id: String,
    pub fields: ClassFields,
    pub content_hash: String,
}

impl PersistedCourse {
    /// Rebuild a document from the stored tree, e.g. to export it as an outline.
    ///
    /// Scratch ids are reassigned in tree order.
    pub fn to_document(&self) -> Course {
        let mut next = 0u32;
        let mut scratch = || {
            next += 1;
            ScratchId(next)
        };

        let mut modules = Vec::with_capacity(self.modules.len());
        for m in &self.modules {
            let module_id = scratch();
            let mut topics = Vec::with_capacity(m.topics.len());
            for t in &m.topics {
                let topic_id = scratch();
                let mut classes = Vec::with_capacity(t.classes.len());
                for c in &t.classes {
                    classes.push(Class {
                        scratch_id: scratch(),
                        fields: c.fields.clone(),
                    });
                }
                topics.push(Topic {
                    scratch_id: topic_id,
                    fields: t.fields.clone(),
                    classes,
                });
            }
            modules.push(Module {
                scratch_id: module_id,
                fields: m.fields.clone(),
                topics,
            });
        }

        Course {
            id: Some(self.id.clone()),
            fields: self.fields.clone(),
            modules,
        }
    }

    /// Find a persisted Class by identifier anywhere in the tree.
    pub fn find_class(&self, id: &str) -> Option<&PersistedClass> {
        self.modules
            .iter()
            .flat_map(|m| m.topics.iter())
            .flat_map(|t| t.classes.iter())
            .find(|c| c.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn class_fields(order: u32) -> ClassFields {
        ClassFields::new(order, ContentType::Text, DEFAULT_CLASS_DURATION_SECS)
    }

    #[test]
    fn content_type_parses_case_insensitively() {
        assert_eq!("Video".parse::<ContentType>(), Ok(ContentType::Video));
        assert_eq!(" contest ".parse::<ContentType>(), Ok(ContentType::Contest));
        assert!("audio".parse::<ContentType>().is_err());
        assert_eq!(ContentType::Text.to_string(), "text");
    }

    #[test]
    fn content_type_serializes_lowercase() {
        let json = serde_json::to_string(&ContentType::Contest).expect("serialize");
        assert_eq!(json, "\"contest\"");
    }

    #[test]
    fn fingerprint_tracks_field_changes() {
        let a = class_fields(1);
        let mut b = a.clone();
        assert_eq!(a.fingerprint(), b.fingerprint());

        b.title = "Renamed".into();
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn persisted_tree_converts_to_document() {
        let fields = class_fields(2);
        let persisted = PersistedCourse {
            id: "course-1".into(),
            fields: CourseFields {
                title: "Rust".into(),
                ..Default::default()
            },
            modules: vec![PersistedModule {
                id: "m1".into(),
                fields: ModuleFields {
                    order: 1,
                    ..Default::default()
                },
                content_hash: String::new(),
                topics: vec![PersistedTopic {
                    id: "t1".into(),
                    fields: TopicFields {
                        title: "Ownership".into(),
                        order: 1,
                    },
                    content_hash: String::new(),
                    classes: vec![PersistedClass {
                        id: "c1".into(),
                        fields: fields.clone(),
                        content_hash: fields.fingerprint(),
                    }],
                }],
            }],
        };

        let doc = persisted.to_document();
        assert_eq!(doc.id.as_deref(), Some("course-1"));
        assert_eq!(doc.modules[0].scratch_id, ScratchId(1));
        assert_eq!(doc.modules[0].topics[0].scratch_id, ScratchId(2));
        let classes: Vec<_> = doc.classes().collect();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].fields, fields);
        assert_eq!(classes[0].scratch_id, ScratchId(3));

        assert!(persisted.find_class("c1").is_some());
        assert!(persisted.find_class("missing").is_none());
    }
}
