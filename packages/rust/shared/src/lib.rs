//! Shared types, error model, and configuration for curriculum imports.
//!
//! This crate is the foundation depended on by all other curriculum crates.
//! It provides:
//! - [`CurriculumError`]: the unified error type
//! - The parsed document ([`Course`], [`Module`], [`Topic`], [`Class`]) and
//!   the persisted tree ([`PersistedCourse`] and friends)
//! - The persistence adapter contract ([`CourseStore`])
//! - Configuration ([`AppConfig`], [`ParseOptions`], config loading)

pub mod config;
pub mod error;
pub mod store;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ImportConfig, OrphanPolicy, ParseOptions, ParserConfig, StorageConfig,
    config_dir, config_file_path, database_path, init_config, load_config, load_config_from,
};
pub use error::{CurriculumError, Result};
pub use store::CourseStore;
pub use types::{
    Class, ClassFields, ContentType, Course, CourseFields, DEFAULT_CLASS_DURATION_SECS,
    Fingerprint, Module, ModuleFields, PersistedClass, PersistedCourse, PersistedModule,
    PersistedTopic, ScratchId, Topic, TopicFields,
};
