//! End-to-end import pipeline: outline text → parse → validate → reconcile → store.

use std::time::{Duration, Instant};

use tracing::{info, instrument};

use curriculum_outline::{parse_outline, validate};
use curriculum_shared::{AppConfig, CourseStore, OrphanPolicy, ParseOptions, Result};

use crate::apply::{AppliedPlan, apply_plan};
use crate::reconcile::{MergePlan, PlanSummary, reconcile};

/// Configuration for [`import_course`].
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub parse: ParseOptions,
    /// What to do with stored nodes the document no longer mentions.
    pub orphans: OrphanPolicy,
    /// Plan only; make no store calls besides reading the stored tree.
    pub dry_run: bool,
}

impl From<&AppConfig> for ImportOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            parse: ParseOptions::from(config),
            orphans: config.import.orphans,
            dry_run: false,
        }
    }
}

/// Result of [`import_course`].
#[derive(Debug)]
pub struct ImportResult {
    /// Stored course id; `None` only for a dry run of a course without `Course ID:`.
    pub course_id: Option<String>,
    pub summary: PlanSummary,
    pub plan: MergePlan,
    /// `None` on a dry run.
    pub applied: Option<AppliedPlan>,
    /// Total elapsed time.
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each plan op is applied.
    fn op_applied(&self, description: &str, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, result: &ImportResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn op_applied(&self, _description: &str, _current: usize, _total: usize) {}
    fn done(&self, _result: &ImportResult) {}
}

/// Run the full import pipeline.
///
/// 1. Parse the outline
/// 2. Validate required fields (nothing is written on failure)
/// 3. Load the stored tree for `Course ID`, if one is given
/// 4. Reconcile into a merge plan
/// 5. Apply the plan, unless `dry_run`
///
/// Callers must serialize imports of the same course.
#[instrument(skip_all, fields(bytes = source.len(), dry_run = options.dry_run))]
pub async fn import_course(
    source: &str,
    options: &ImportOptions,
    store: &dyn CourseStore,
    progress: &dyn ProgressReporter,
) -> Result<ImportResult> {
    let start = Instant::now();

    progress.phase("Parsing outline");
    let outline = parse_outline(source, &options.parse)?;

    progress.phase("Validating");
    validate(&outline)?;

    progress.phase("Loading stored course");
    let persisted = match outline.course.id.as_deref() {
        Some(id) => store.persisted_tree(id).await?,
        None => None,
    };

    progress.phase("Reconciling");
    let plan = reconcile(&outline.course, persisted.as_ref(), options.orphans);
    let summary = plan.summary();

    let applied = if options.dry_run {
        info!(%summary, "dry run; nothing written");
        None
    } else {
        progress.phase("Writing");
        Some(apply_plan(&plan, store, progress).await?)
    };

    let result = ImportResult {
        course_id: applied
            .as_ref()
            .map(|a| a.course_id.clone())
            .or_else(|| plan.course.id.clone()),
        summary,
        plan,
        applied,
        elapsed: start.elapsed(),
    };

    info!(
        course_id = ?result.course_id,
        %summary,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "import complete"
    );

    progress.done(&result);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryStore, StoreCall};
    use crate::reconcile::{NodeFields, PlanOp};
    use curriculum_shared::CurriculumError;
    use curriculum_storage::Storage;
    use pretty_assertions::assert_eq;

    const SCENARIO_A: &str = "\
Course Title: Demo
Course ID: demo
Module 1:
Title: Basics
Topic 1.1:
Title: Reading
Class 1.1.1:
Title: First read
Content Type: text
Text Content:
line1
line2
";

    fn fixture() -> String {
        std::fs::read_to_string("../../../fixtures/outline/full-course.txt").expect("read fixture")
    }

    #[tokio::test]
    async fn scenario_b_updates_original_class_only() {
        let store = MemoryStore::new();
        let options = ImportOptions::default();

        let first = import_course(SCENARIO_A, &options, &store, &SilentProgress)
            .await
            .expect("first import");
        let class_id = store
            .course("demo")
            .expect("stored")
            .modules[0]
            .topics[0]
            .classes[0]
            .id
            .clone();
        assert_eq!(first.summary.created, 3);
        store.clear_calls();

        let edited = SCENARIO_A.replace("Title: First read", "Title: Second read");
        let second = import_course(&edited, &options, &store, &SilentProgress)
            .await
            .expect("second import");

        assert_eq!(second.summary.created, 0);
        assert_eq!(second.summary.updated, 1);
        assert_eq!(
            store.calls(),
            vec![StoreCall::Update {
                level: crate::reconcile::Level::Class,
                id: class_id.clone(),
            }]
        );
        let class = &store.course("demo").unwrap().modules[0].topics[0].classes[0];
        assert_eq!(class.id, class_id);
        assert_eq!(class.fields.title, "Second read");
    }

    #[tokio::test]
    async fn dry_run_reads_but_never_writes() {
        let store = MemoryStore::new();
        let options = ImportOptions {
            dry_run: true,
            ..ImportOptions::default()
        };

        let result = import_course(SCENARIO_A, &options, &store, &SilentProgress)
            .await
            .expect("dry run");

        assert!(result.applied.is_none());
        assert_eq!(result.course_id.as_deref(), Some("demo"));
        assert_eq!(result.summary.created, 3);
        assert!(store.calls().is_empty());
        assert!(store.course("demo").is_none());
    }

    #[tokio::test]
    async fn validation_failure_writes_nothing() {
        let store = MemoryStore::new();
        let input = SCENARIO_A.replace("Content Type: text", "Content Type: video");

        let err = import_course(&input, &ImportOptions::default(), &store, &SilentProgress)
            .await
            .expect_err("video without url");

        assert!(matches!(err, CurriculumError::Validation { line: Some(7), .. }));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn course_without_id_gets_generated_one() {
        let store = MemoryStore::new();
        let input = SCENARIO_A.replace("Course ID: demo\n", "");

        let result = import_course(&input, &ImportOptions::default(), &store, &SilentProgress)
            .await
            .expect("import");

        let id = result.course_id.expect("generated id");
        assert_ne!(id, "demo");
        assert!(store.course(&id).is_some());
    }

    #[tokio::test]
    async fn prune_removes_dropped_module() {
        let store = MemoryStore::new();
        let two_modules = format!("{SCENARIO_A}Module 2:\nTitle: Extra\n");
        import_course(&two_modules, &ImportOptions::default(), &store, &SilentProgress)
            .await
            .expect("seed");

        let keep = import_course(SCENARIO_A, &ImportOptions::default(), &store, &SilentProgress)
            .await
            .expect("keep");
        assert_eq!(keep.summary.untouched, 1);
        assert_eq!(store.course("demo").unwrap().modules.len(), 2);

        let prune = ImportOptions {
            orphans: OrphanPolicy::Prune,
            ..ImportOptions::default()
        };
        let pruned = import_course(SCENARIO_A, &prune, &store, &SilentProgress)
            .await
            .expect("prune");
        assert_eq!(pruned.summary.deleted, 1);
        assert_eq!(store.course("demo").unwrap().modules.len(), 1);
    }

    #[tokio::test]
    async fn fixture_round_trips_through_database() {
        let path = std::env::temp_dir().join(format!("curriculum_import_{}.db", uuid::Uuid::now_v7()));
        let storage = Storage::open(&path).await.expect("open db");
        let source = fixture();

        let first = import_course(&source, &ImportOptions::default(), &storage, &SilentProgress)
            .await
            .expect("first import");
        assert_eq!(first.course_id.as_deref(), Some("backend-foundations"));
        assert_eq!(first.summary.updated + first.summary.unchanged, 0);

        let again = import_course(&source, &ImportOptions::default(), &storage, &SilentProgress)
            .await
            .expect("re-import");
        assert_eq!(again.summary.created, 0);
        assert_eq!(again.summary.updated, 0);
        assert_eq!(again.summary.unchanged, first.summary.created);
        assert_eq!(again.applied.expect("applied").writes, 0);

        let stored = storage
            .persisted_tree("backend-foundations")
            .await
            .expect("load")
            .expect("course");
        let parsed = parse_outline(&source, &ParseOptions::default()).expect("parse");
        assert_eq!(stored.to_document(), parsed.course);
    }

    #[tokio::test]
    async fn identifiers_survive_reordered_content() {
        let store = MemoryStore::new();
        import_course(SCENARIO_A, &ImportOptions::default(), &store, &SilentProgress)
            .await
            .expect("seed");
        let before = store.course("demo").unwrap();

        let edited = SCENARIO_A.replace("line1\nline2", "brand new body");
        let result = import_course(&edited, &ImportOptions::default(), &store, &SilentProgress)
            .await
            .expect("reimport");

        let update_ids: Vec<_> = result
            .plan
            .ops
            .iter()
            .filter_map(|op| match op {
                PlanOp::Update {
                    id,
                    fields: NodeFields::Class(_),
                    changed: true,
                } => Some(id.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(update_ids, vec![before.modules[0].topics[0].classes[0].id.clone()]);
    }
}
