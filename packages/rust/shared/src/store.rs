//! Persistence adapter contract consumed by the reconciler.
//!
//! Implementations own identifier assignment: every `create_*` call returns
//! the durable identifier of the new node. Parent-before-child ordering is
//! the caller's job, since a child cannot be created before its parent id
//! exists.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ClassFields, CourseFields, ModuleFields, PersistedCourse, TopicFields};

/// Read/create/update/delete access to stored course trees.
///
/// Implementations must be `Send + Sync` so a store can be shared across tasks.
/// Imports of the same course must be serialized by the caller.
#[async_trait]
pub trait CourseStore: Send + Sync {
    /// Load the full stored tree for a course, or `None` if it does not exist.
    async fn persisted_tree(&self, course_id: &str) -> Result<Option<PersistedCourse>>;

    /// Create the course (with `id`, or a generated id when `None`) or
    /// overwrite its fields if it already exists. Returns the course id.
    async fn upsert_course(&self, id: Option<&str>, fields: &CourseFields) -> Result<String>;

    async fn create_module(&self, course_id: &str, fields: &ModuleFields) -> Result<String>;
    async fn update_module(&self, id: &str, fields: &ModuleFields) -> Result<()>;
    /// Delete a module and everything under it.
    async fn delete_module(&self, id: &str) -> Result<()>;

    async fn create_topic(&self, module_id: &str, fields: &TopicFields) -> Result<String>;
    async fn update_topic(&self, id: &str, fields: &TopicFields) -> Result<()>;
    /// Delete a topic and its classes.
    async fn delete_topic(&self, id: &str) -> Result<()>;

    async fn create_class(&self, topic_id: &str, fields: &ClassFields) -> Result<String>;
    async fn update_class(&self, id: &str, fields: &ClassFields) -> Result<()>;
    async fn delete_class(&self, id: &str) -> Result<()>;
}
