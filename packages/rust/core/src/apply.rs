//! Execute a [`MergePlan`] against a [`CourseStore`].

use tracing::{info, instrument};

use curriculum_shared::{CourseStore, CurriculumError, Result};

use crate::pipeline::ProgressReporter;
use crate::reconcile::{Level, MergePlan, NodeFields, ParentRef, PlanOp};

/// What [`apply_plan`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedPlan {
    pub course_id: String,
    /// Identifier touched by each op, aligned with `MergePlan::ops`.
    pub ids: Vec<String>,
    /// Number of store calls that wrote something (course row included).
    pub writes: usize,
    /// Updates skipped because nothing changed.
    pub skipped: usize,
}

/// Run every op in order, resolving planned parents to the identifiers
/// returned by earlier creates.
///
/// Stops at the first store failure. Ops already applied stay applied.
#[instrument(skip_all, fields(course_id = ?plan.course.id, ops = plan.ops.len()))]
pub async fn apply_plan(
    plan: &MergePlan,
    store: &dyn CourseStore,
    progress: &dyn ProgressReporter,
) -> Result<AppliedPlan> {
    let mut writes = 0;
    let mut skipped = 0;

    let course_id = match (&plan.course.id, plan.course.changed) {
        (Some(id), false) => id.clone(),
        (id, _) => {
            writes += 1;
            store
                .upsert_course(id.as_deref(), &plan.course.fields)
                .await?
        }
    };

    let total = plan.ops.len();
    let mut ids: Vec<String> = Vec::with_capacity(total);

    for (index, op) in plan.ops.iter().enumerate() {
        let id = match op {
            PlanOp::Create { parent, fields } => {
                let parent_id = match parent {
                    ParentRef::Course => course_id.as_str(),
                    ParentRef::Existing(id) => id.as_str(),
                    ParentRef::Planned(target) => {
                        ids.get(*target).map(String::as_str).ok_or_else(|| {
                            CurriculumError::validation(
                                None,
                                format!("op {index} refers to op {target}, which has not run"),
                            )
                        })?
                    }
                };
                let id = match fields {
                    NodeFields::Module(f) => store.create_module(parent_id, f).await?,
                    NodeFields::Topic(f) => store.create_topic(parent_id, f).await?,
                    NodeFields::Class(f) => store.create_class(parent_id, f).await?,
                };
                writes += 1;
                id
            }
            PlanOp::Update {
                id,
                changed: false,
                ..
            } => {
                skipped += 1;
                id.clone()
            }
            PlanOp::Update { id, fields, .. } => {
                match fields {
                    NodeFields::Module(f) => store.update_module(id, f).await?,
                    NodeFields::Topic(f) => store.update_topic(id, f).await?,
                    NodeFields::Class(f) => store.update_class(id, f).await?,
                }
                writes += 1;
                id.clone()
            }
            PlanOp::Delete { level, id } => {
                match level {
                    Level::Module => store.delete_module(id).await?,
                    Level::Topic => store.delete_topic(id).await?,
                    Level::Class => store.delete_class(id).await?,
                }
                writes += 1;
                id.clone()
            }
        };

        progress.op_applied(&op.to_string(), index + 1, total);
        ids.push(id);
    }

    info!(%course_id, writes, skipped, "merge plan applied");

    Ok(AppliedPlan {
        course_id,
        ids,
        writes,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryStore, StoreCall};
    use crate::pipeline::SilentProgress;
    use crate::reconcile::{CourseOp, reconcile};
    use curriculum_outline::parse_outline;
    use curriculum_shared::{CourseFields, ModuleFields, OrphanPolicy, ParseOptions};
    use pretty_assertions::assert_eq;

    const OUTLINE: &str = "Course Title: Demo\nCourse ID: demo\nModule 1:\nTitle: M\nTopic 1.1:\nTitle: T\nClass 1.1.1:\nTitle: A\nClass 1.1.2:\nTitle: B\n";

    fn plan_for(input: &str, store_tree: Option<&curriculum_shared::PersistedCourse>) -> MergePlan {
        let course = parse_outline(input, &ParseOptions::default())
            .expect("parse")
            .course;
        reconcile(&course, store_tree, OrphanPolicy::Keep)
    }

    #[tokio::test]
    async fn fresh_plan_builds_whole_tree() {
        let store = MemoryStore::new();
        let applied = apply_plan(&plan_for(OUTLINE, None), &store, &SilentProgress)
            .await
            .expect("apply");

        assert_eq!(applied.course_id, "demo");
        assert_eq!(applied.writes, 5);
        assert_eq!(applied.skipped, 0);

        let tree = store.course("demo").expect("stored");
        let classes = &tree.modules[0].topics[0].classes;
        assert_eq!(classes.len(), 2);
        assert_eq!(applied.ids[2], classes[0].id);
        assert_eq!(applied.ids[3], classes[1].id);
    }

    #[tokio::test]
    async fn second_apply_writes_nothing() {
        let store = MemoryStore::new();
        apply_plan(&plan_for(OUTLINE, None), &store, &SilentProgress)
            .await
            .expect("first apply");
        store.clear_calls();

        let stored = store.course("demo");
        let plan = plan_for(OUTLINE, stored.as_ref());
        let applied = apply_plan(&plan, &store, &SilentProgress)
            .await
            .expect("second apply");

        assert_eq!(applied.writes, 0);
        assert_eq!(applied.skipped, 4);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn stops_at_first_store_failure() {
        let store = MemoryStore::new();
        let module = ModuleFields {
            title: "M".into(),
            order: 1,
            ..ModuleFields::default()
        };
        let plan = MergePlan {
            course: CourseOp {
                id: Some("demo".into()),
                fields: CourseFields {
                    title: "Demo".into(),
                    ..CourseFields::default()
                },
                exists: false,
                changed: true,
            },
            ops: vec![
                PlanOp::Create {
                    parent: ParentRef::Course,
                    fields: NodeFields::Module(module.clone()),
                },
                PlanOp::Update {
                    id: "missing".into(),
                    fields: NodeFields::Module(module.clone()),
                    changed: true,
                },
                PlanOp::Create {
                    parent: ParentRef::Course,
                    fields: NodeFields::Module(ModuleFields { order: 2, ..module }),
                },
            ],
            untouched: Vec::new(),
        };

        let err = apply_plan(&plan, &store, &SilentProgress)
            .await
            .expect_err("update of unknown module");
        assert!(matches!(err, CurriculumError::Storage(_)));

        let calls = store.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[1], StoreCall::Create { level: Level::Module, .. }));
        assert_eq!(store.course("demo").expect("course").modules.len(), 1);
    }

    #[tokio::test]
    async fn planned_parent_must_exist() {
        let store = MemoryStore::new();
        let plan = MergePlan {
            course: CourseOp {
                id: Some("demo".into()),
                fields: CourseFields::default(),
                exists: false,
                changed: true,
            },
            ops: vec![PlanOp::Create {
                parent: ParentRef::Planned(3),
                fields: NodeFields::Topic(Default::default()),
            }],
            untouched: Vec::new(),
        };

        let err = apply_plan(&plan, &store, &SilentProgress)
            .await
            .expect_err("dangling parent");
        assert!(err.to_string().contains("refers to op 3"));
    }
}
