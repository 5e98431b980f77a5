//! SQL migration definitions for the course database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: courses, modules, topics, classes",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS courses (
    id           TEXT PRIMARY KEY,
    title        TEXT NOT NULL,
    description  TEXT NOT NULL,
    course_type  TEXT NOT NULL,
    role         TEXT,
    skill        TEXT,
    company_name TEXT,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

-- `position` holds the outline order; progress data keys on these ids
CREATE TABLE IF NOT EXISTS modules (
    id                     TEXT PRIMARY KEY,
    course_id              TEXT NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
    position               INTEGER NOT NULL,
    title                  TEXT NOT NULL,
    description            TEXT NOT NULL,
    learning_outcomes_json TEXT NOT NULL,
    content_hash           TEXT NOT NULL,
    created_at             TEXT NOT NULL,
    updated_at             TEXT NOT NULL,
    UNIQUE(course_id, position)
);

CREATE TABLE IF NOT EXISTS topics (
    id           TEXT PRIMARY KEY,
    module_id    TEXT NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
    position     INTEGER NOT NULL,
    title        TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL,
    UNIQUE(module_id, position)
);

CREATE TABLE IF NOT EXISTS classes (
    id                    TEXT PRIMARY KEY,
    topic_id              TEXT NOT NULL REFERENCES topics(id) ON DELETE CASCADE,
    position              INTEGER NOT NULL,
    title                 TEXT NOT NULL,
    description           TEXT,
    content_type          TEXT NOT NULL,
    video_url             TEXT,
    text_content          TEXT,
    contest_url           TEXT,
    contest_questions     INTEGER,
    contest_syllabus_json TEXT,
    duration_secs         INTEGER NOT NULL,
    content_hash          TEXT NOT NULL,
    created_at            TEXT NOT NULL,
    updated_at            TEXT NOT NULL,
    UNIQUE(topic_id, position)
);

CREATE INDEX IF NOT EXISTS idx_modules_course_id ON modules(course_id);
CREATE INDEX IF NOT EXISTS idx_topics_module_id ON topics(module_id);
CREATE INDEX IF NOT EXISTS idx_classes_topic_id ON classes(topic_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
