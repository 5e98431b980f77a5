//! Turso Embedded / libSQL storage layer for course trees.
//!
//! The [`Storage`] struct wraps a libSQL database holding courses, modules,
//! topics and classes, and implements [`CourseStore`] so the import pipeline
//! can write to it.
//!
//! **Access rules:**
//! - imports: read-write via [`Storage::open`]
//! - export / listing: read-only via [`Storage::open_readonly`]

mod migrations;

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use curriculum_shared::{
    ClassFields, ContentType, CourseFields, CourseStore, CurriculumError, Fingerprint,
    ModuleFields, PersistedClass, PersistedCourse, PersistedModule, PersistedTopic, Result,
    TopicFields,
};
use libsql::{Connection, Database, params};
use tracing::debug;
use uuid::Uuid;

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// One row of [`Storage::list_courses`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseListing {
    pub id: String,
    pub title: String,
    pub modules: u32,
    pub updated_at: String,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CurriculumError::io(parent, e))?;
        }

        let storage = Self::connect(path, false).await?;
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CurriculumError::Storage(format!(
                "database not found: {}",
                path.display()
            )));
        }
        Self::connect(path, true).await
    }

    async fn connect(path: &Path, readonly: bool) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        // Deletes rely on ON DELETE CASCADE
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .await
            .map_err(storage_err)?;

        Ok(Self { db, conn, readonly })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        CurriculumError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(CurriculumError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    /// List stored courses, ordered by title.
    pub async fn list_courses(&self) -> Result<Vec<CourseListing>> {
        let mut rows = self
            .conn
            .query(
                "SELECT c.id, c.title, c.updated_at,
                        (SELECT COUNT(*) FROM modules m WHERE m.course_id = c.id)
                 FROM courses c ORDER BY c.title, c.id",
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(CourseListing {
                id: row.get::<String>(0).map_err(storage_err)?,
                title: row.get::<String>(1).map_err(storage_err)?,
                updated_at: row.get::<String>(2).map_err(storage_err)?,
                modules: row.get::<u32>(3).map_err(storage_err)?,
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Tree loading
    // -----------------------------------------------------------------------

    async fn load_course(&self, course_id: &str) -> Result<Option<(String, CourseFields)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, title, description, course_type, role, skill, company_name
                 FROM courses WHERE id = ?1",
                params![course_id],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some((
                row.get::<String>(0).map_err(storage_err)?,
                CourseFields {
                    title: row.get::<String>(1).map_err(storage_err)?,
                    description: row.get::<String>(2).map_err(storage_err)?,
                    course_type: row.get::<String>(3).map_err(storage_err)?,
                    role: row.get::<String>(4).ok(),
                    skill: row.get::<String>(5).ok(),
                    company_name: row.get::<String>(6).ok(),
                },
            ))),
            None => Ok(None),
        }
    }

    /// Classes of a course, grouped by topic id, in position order.
    async fn load_classes(&self, course_id: &str) -> Result<HashMap<String, Vec<PersistedClass>>> {
        let mut rows = self
            .conn
            .query(
                "SELECT c.id, c.topic_id, c.position, c.title, c.description, c.content_type,
                        c.video_url, c.text_content, c.contest_url, c.contest_questions,
                        c.contest_syllabus_json, c.duration_secs, c.content_hash
                 FROM classes c
                 JOIN topics t ON t.id = c.topic_id
                 JOIN modules m ON m.id = t.module_id
                 WHERE m.course_id = ?1
                 ORDER BY c.position",
                params![course_id],
            )
            .await
            .map_err(storage_err)?;

        let mut grouped: HashMap<String, Vec<PersistedClass>> = HashMap::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let topic_id = row.get::<String>(1).map_err(storage_err)?;
            grouped.entry(topic_id).or_default().push(row_to_class(&row)?);
        }
        Ok(grouped)
    }

    /// Topics of a course (with their classes), grouped by module id.
    async fn load_topics(
        &self,
        course_id: &str,
        mut classes: HashMap<String, Vec<PersistedClass>>,
    ) -> Result<HashMap<String, Vec<PersistedTopic>>> {
        let mut rows = self
            .conn
            .query(
                "SELECT t.id, t.module_id, t.position, t.title, t.content_hash
                 FROM topics t
                 JOIN modules m ON m.id = t.module_id
                 WHERE m.course_id = ?1
                 ORDER BY t.position",
                params![course_id],
            )
            .await
            .map_err(storage_err)?;

        let mut grouped: HashMap<String, Vec<PersistedTopic>> = HashMap::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let id = row.get::<String>(0).map_err(storage_err)?;
            let module_id = row.get::<String>(1).map_err(storage_err)?;
            let topic = PersistedTopic {
                fields: TopicFields {
                    order: row.get::<u32>(2).map_err(storage_err)?,
                    title: row.get::<String>(3).map_err(storage_err)?,
                },
                content_hash: row.get::<String>(4).map_err(storage_err)?,
                classes: classes.remove(&id).unwrap_or_default(),
                id,
            };
            grouped.entry(module_id).or_default().push(topic);
        }
        Ok(grouped)
    }

    async fn load_modules(
        &self,
        course_id: &str,
        mut topics: HashMap<String, Vec<PersistedTopic>>,
    ) -> Result<Vec<PersistedModule>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, position, title, description, learning_outcomes_json, content_hash
                 FROM modules WHERE course_id = ?1 ORDER BY position",
                params![course_id],
            )
            .await
            .map_err(storage_err)?;

        let mut modules = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let id = row.get::<String>(0).map_err(storage_err)?;
            let outcomes_json = row.get::<String>(4).map_err(storage_err)?;
            modules.push(PersistedModule {
                fields: ModuleFields {
                    order: row.get::<u32>(1).map_err(storage_err)?,
                    title: row.get::<String>(2).map_err(storage_err)?,
                    description: row.get::<String>(3).map_err(storage_err)?,
                    learning_outcomes: serde_json::from_str(&outcomes_json)
                        .map_err(storage_err)?,
                },
                content_hash: row.get::<String>(5).map_err(storage_err)?,
                topics: topics.remove(&id).unwrap_or_default(),
                id,
            });
        }
        Ok(modules)
    }
}

// ---------------------------------------------------------------------------
// CourseStore
// ---------------------------------------------------------------------------

#[async_trait]
impl CourseStore for Storage {
    async fn persisted_tree(&self, course_id: &str) -> Result<Option<PersistedCourse>> {
        let Some((id, fields)) = self.load_course(course_id).await? else {
            return Ok(None);
        };

        let classes = self.load_classes(&id).await?;
        let topics = self.load_topics(&id, classes).await?;
        let modules = self.load_modules(&id, topics).await?;

        Ok(Some(PersistedCourse {
            id,
            fields,
            modules,
        }))
    }

    async fn upsert_course(&self, id: Option<&str>, fields: &CourseFields) -> Result<String> {
        self.check_writable()?;
        let id = id.map_or_else(|| Uuid::now_v7().to_string(), str::to_string);
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO courses (id, title, description, course_type, role, skill, company_name, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                   title = excluded.title,
                   description = excluded.description,
                   course_type = excluded.course_type,
                   role = excluded.role,
                   skill = excluded.skill,
                   company_name = excluded.company_name,
                   updated_at = excluded.updated_at",
                params![
                    id.as_str(),
                    fields.title.as_str(),
                    fields.description.as_str(),
                    fields.course_type.as_str(),
                    fields.role.as_deref(),
                    fields.skill.as_deref(),
                    fields.company_name.as_deref(),
                    now.as_str(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;
        debug!(course_id = %id, "course upserted");
        Ok(id)
    }

    async fn create_module(&self, course_id: &str, fields: &ModuleFields) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        let outcomes = serde_json::to_string(&fields.learning_outcomes).map_err(storage_err)?;
        self.conn
            .execute(
                "INSERT INTO modules (id, course_id, position, title, description, learning_outcomes_json, content_hash, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id.as_str(),
                    course_id,
                    i64::from(fields.order),
                    fields.title.as_str(),
                    fields.description.as_str(),
                    outcomes.as_str(),
                    fields.fingerprint(),
                    now.as_str(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;
        debug!(module_id = %id, order = fields.order, "module created");
        Ok(id)
    }

    async fn update_module(&self, id: &str, fields: &ModuleFields) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        let outcomes = serde_json::to_string(&fields.learning_outcomes).map_err(storage_err)?;
        let affected = self
            .conn
            .execute(
                "UPDATE modules SET position = ?1, title = ?2, description = ?3,
                   learning_outcomes_json = ?4, content_hash = ?5, updated_at = ?6
                 WHERE id = ?7",
                params![
                    i64::from(fields.order),
                    fields.title.as_str(),
                    fields.description.as_str(),
                    outcomes.as_str(),
                    fields.fingerprint(),
                    now.as_str(),
                    id,
                ],
            )
            .await
            .map_err(storage_err)?;
        ensure_found(affected, "module", id)
    }

    async fn delete_module(&self, id: &str) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute("DELETE FROM modules WHERE id = ?1", params![id])
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn create_topic(&self, module_id: &str, fields: &TopicFields) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO topics (id, module_id, position, title, content_hash, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id.as_str(),
                    module_id,
                    i64::from(fields.order),
                    fields.title.as_str(),
                    fields.fingerprint(),
                    now.as_str(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;
        debug!(topic_id = %id, order = fields.order, "topic created");
        Ok(id)
    }

    async fn update_topic(&self, id: &str, fields: &TopicFields) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        let affected = self
            .conn
            .execute(
                "UPDATE topics SET position = ?1, title = ?2, content_hash = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![
                    i64::from(fields.order),
                    fields.title.as_str(),
                    fields.fingerprint(),
                    now.as_str(),
                    id,
                ],
            )
            .await
            .map_err(storage_err)?;
        ensure_found(affected, "topic", id)
    }

    async fn delete_topic(&self, id: &str) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute("DELETE FROM topics WHERE id = ?1", params![id])
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn create_class(&self, topic_id: &str, fields: &ClassFields) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        let syllabus = syllabus_json(fields)?;
        self.conn
            .execute(
                "INSERT INTO classes (id, topic_id, position, title, description, content_type,
                   video_url, text_content, contest_url, contest_questions, contest_syllabus_json,
                   duration_secs, content_hash, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    id.as_str(),
                    topic_id,
                    i64::from(fields.order),
                    fields.title.as_str(),
                    fields.description.as_deref(),
                    fields.content_type.as_str(),
                    fields.video_url.as_deref(),
                    fields.text_content.as_deref(),
                    fields.contest_url.as_deref(),
                    fields.contest_questions.map(i64::from),
                    syllabus.as_deref(),
                    i64::from(fields.duration_secs),
                    fields.fingerprint(),
                    now.as_str(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;
        debug!(class_id = %id, order = fields.order, "class created");
        Ok(id)
    }

    async fn update_class(&self, id: &str, fields: &ClassFields) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        let syllabus = syllabus_json(fields)?;
        let affected = self
            .conn
            .execute(
                "UPDATE classes SET position = ?1, title = ?2, description = ?3, content_type = ?4,
                   video_url = ?5, text_content = ?6, contest_url = ?7, contest_questions = ?8,
                   contest_syllabus_json = ?9, duration_secs = ?10, content_hash = ?11,
                   updated_at = ?12
                 WHERE id = ?13",
                params![
                    i64::from(fields.order),
                    fields.title.as_str(),
                    fields.description.as_deref(),
                    fields.content_type.as_str(),
                    fields.video_url.as_deref(),
                    fields.text_content.as_deref(),
                    fields.contest_url.as_deref(),
                    fields.contest_questions.map(i64::from),
                    syllabus.as_deref(),
                    i64::from(fields.duration_secs),
                    fields.fingerprint(),
                    now.as_str(),
                    id,
                ],
            )
            .await
            .map_err(storage_err)?;
        ensure_found(affected, "class", id)
    }

    async fn delete_class(&self, id: &str) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute("DELETE FROM classes WHERE id = ?1", params![id])
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

fn storage_err(e: impl std::fmt::Display) -> CurriculumError {
    CurriculumError::Storage(e.to_string())
}

fn ensure_found(affected: u64, kind: &str, id: &str) -> Result<()> {
    if affected == 0 {
        return Err(CurriculumError::Storage(format!("{kind} {id} not found")));
    }
    Ok(())
}

fn syllabus_json(fields: &ClassFields) -> Result<Option<String>> {
    fields
        .contest_syllabus
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(storage_err)
}

/// Convert a `classes` row (see [`Storage::load_classes`]) to a [`PersistedClass`].
fn row_to_class(row: &libsql::Row) -> Result<PersistedClass> {
    let content_type = row
        .get::<String>(5)
        .map_err(storage_err)?
        .parse::<ContentType>()
        .map_err(CurriculumError::Storage)?;
    let contest_syllabus = match row.get::<String>(10).ok() {
        Some(json) => Some(serde_json::from_str(&json).map_err(storage_err)?),
        None => None,
    };

    Ok(PersistedClass {
        id: row.get::<String>(0).map_err(storage_err)?,
        fields: ClassFields {
            order: row.get::<u32>(2).map_err(storage_err)?,
            title: row.get::<String>(3).map_err(storage_err)?,
            description: row.get::<String>(4).ok(),
            content_type,
            video_url: row.get::<String>(6).ok(),
            text_content: row.get::<String>(7).ok(),
            contest_url: row.get::<String>(8).ok(),
            contest_questions: row.get::<u32>(9).ok(),
            contest_syllabus,
            duration_secs: row.get::<u32>(11).map_err(storage_err)?,
        },
        content_hash: row.get::<String>(12).map_err(storage_err)?,
    })
}
