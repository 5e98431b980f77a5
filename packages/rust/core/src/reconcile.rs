//! Positional reconciliation of a parsed course against its stored tree.
//!
//! At every level (Modules under the Course, Topics under a Module, Classes
//! under a Topic) parsed children are matched to stored siblings by `order`.
//! A match becomes an UPDATE carrying the stored identifier, anything else a
//! CREATE. Reordering siblings is therefore indistinguishable from replacing
//! them; there is no content-similarity fallback.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use curriculum_shared::{
    ClassFields, Course, CourseFields, Fingerprint, Module, ModuleFields, OrphanPolicy,
    PersistedClass, PersistedCourse, PersistedModule, PersistedTopic, Topic, TopicFields,
};

// ---------------------------------------------------------------------------
// Plan types
// ---------------------------------------------------------------------------

/// Tree level of a Module, Topic or Class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Module,
    Topic,
    Class,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Topic => "topic",
            Self::Class => "class",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a CREATE attaches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentRef {
    /// The course itself (Modules only).
    Course,
    /// A node that already exists in the store.
    Existing(String),
    /// The node created by an earlier op of the same plan, by op index.
    Planned(usize),
}

/// Field values for one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "level", rename_all = "lowercase")]
pub enum NodeFields {
    Module(ModuleFields),
    Topic(TopicFields),
    Class(ClassFields),
}

impl NodeFields {
    pub fn level(&self) -> Level {
        match self {
            Self::Module(_) => Level::Module,
            Self::Topic(_) => Level::Topic,
            Self::Class(_) => Level::Class,
        }
    }

    pub fn order(&self) -> u32 {
        match self {
            Self::Module(f) => f.order,
            Self::Topic(f) => f.order,
            Self::Class(f) => f.order,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Module(f) => &f.title,
            Self::Topic(f) => &f.title,
            Self::Class(f) => &f.title,
        }
    }

    fn fingerprint(&self) -> String {
        match self {
            Self::Module(f) => f.fingerprint(),
            Self::Topic(f) => f.fingerprint(),
            Self::Class(f) => f.fingerprint(),
        }
    }
}

/// What happens to the course row itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseOp {
    /// Stored identifier; `None` lets the store generate one.
    pub id: Option<String>,
    pub fields: CourseFields,
    /// Whether a stored course was found.
    pub exists: bool,
    /// Whether the course fields differ from the stored ones.
    pub changed: bool,
}

/// One write against the store. Ops are ordered parent-before-child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PlanOp {
    Create {
        parent: ParentRef,
        fields: NodeFields,
    },
    Update {
        id: String,
        fields: NodeFields,
        /// False when the stored content hash already matches.
        changed: bool,
    },
    /// Only emitted under [`OrphanPolicy::Prune`]; removes the subtree.
    Delete { level: Level, id: String },
}

impl PlanOp {
    pub fn level(&self) -> Level {
        match self {
            Self::Create { fields, .. } | Self::Update { fields, .. } => fields.level(),
            Self::Delete { level, .. } => *level,
        }
    }
}

impl fmt::Display for PlanOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create { fields, .. } => write!(
                f,
                "create {} {} \"{}\"",
                fields.level(),
                fields.order(),
                fields.title()
            ),
            Self::Update {
                id,
                fields,
                changed,
            } => {
                let verb = if *changed { "update" } else { "keep" };
                write!(f, "{verb} {} {} ({id})", fields.level(), fields.order())
            }
            Self::Delete { level, id } => write!(f, "delete {level} ({id})"),
        }
    }
}

/// A stored node with no parsed counterpart, left in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UntouchedNode {
    pub level: Level,
    pub id: String,
    pub order: u32,
}

/// Counts of what a plan does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub untouched: usize,
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} unchanged, {} deleted, {} untouched",
            self.created, self.updated, self.unchanged, self.deleted, self.untouched
        )
    }
}

/// The full outcome of reconciliation, ready for [`crate::apply_plan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergePlan {
    pub course: CourseOp,
    pub ops: Vec<PlanOp>,
    pub untouched: Vec<UntouchedNode>,
}

impl MergePlan {
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary {
            untouched: self.untouched.len(),
            ..PlanSummary::default()
        };
        for op in &self.ops {
            match op {
                PlanOp::Create { .. } => summary.created += 1,
                PlanOp::Update { changed: true, .. } => summary.updated += 1,
                PlanOp::Update { changed: false, .. } => summary.unchanged += 1,
                PlanOp::Delete { .. } => summary.deleted += 1,
            }
        }
        summary
    }

    /// Ops that will actually write something.
    pub fn writes(&self) -> impl Iterator<Item = &PlanOp> {
        self.ops
            .iter()
            .filter(|op| !matches!(op, PlanOp::Update { changed: false, .. }))
    }
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// Align a parsed course with its stored tree and plan the writes.
///
/// Two parsed siblings sharing an `order` collapse onto one node; the last
/// one in document order wins.
#[instrument(skip_all, fields(course_id = ?doc.id, stored = persisted.is_some()))]
pub fn reconcile(
    doc: &Course,
    persisted: Option<&PersistedCourse>,
    orphans: OrphanPolicy,
) -> MergePlan {
    let course = CourseOp {
        id: doc.id.clone().or_else(|| persisted.map(|p| p.id.clone())),
        fields: doc.fields.clone(),
        exists: persisted.is_some(),
        changed: persisted.is_none_or(|p| p.fields != doc.fields),
    };

    let mut planner = Planner {
        orphans,
        ops: Vec::new(),
        untouched: Vec::new(),
    };
    let stored_modules = persisted.map(|p| p.modules.as_slice()).unwrap_or_default();
    planner.modules(&doc.modules, stored_modules);

    let plan = MergePlan {
        course,
        ops: planner.ops,
        untouched: planner.untouched,
    };

    info!(summary = %plan.summary(), "merge plan computed");
    plan
}

struct Planner {
    orphans: OrphanPolicy,
    ops: Vec<PlanOp>,
    untouched: Vec<UntouchedNode>,
}

impl Planner {
    fn modules(&mut self, parsed: &[Module], stored: &[PersistedModule]) {
        let mut existing: BTreeMap<u32, &PersistedModule> =
            stored.iter().map(|m| (m.fields.order, m)).collect();

        for module in collapse(Level::Module, parsed, |m| m.fields.order) {
            let fields = NodeFields::Module(module.fields.clone());
            match existing.remove(&module.fields.order) {
                Some(old) => {
                    let parent = self.update(&old.id, &old.content_hash, fields);
                    self.topics(parent, &module.topics, &old.topics);
                }
                None => {
                    let parent = self.create(ParentRef::Course, fields);
                    self.topics(parent, &module.topics, &[]);
                }
            }
        }

        self.leftovers(Level::Module, existing.into_values().map(|m| (&m.id, m.fields.order)));
    }

    fn topics(&mut self, parent: ParentRef, parsed: &[Topic], stored: &[PersistedTopic]) {
        let mut existing: BTreeMap<u32, &PersistedTopic> =
            stored.iter().map(|t| (t.fields.order, t)).collect();

        for topic in collapse(Level::Topic, parsed, |t| t.fields.order) {
            let fields = NodeFields::Topic(topic.fields.clone());
            match existing.remove(&topic.fields.order) {
                Some(old) => {
                    let me = self.update(&old.id, &old.content_hash, fields);
                    self.classes(me, &topic.classes, &old.classes);
                }
                None => {
                    let me = self.create(parent.clone(), fields);
                    self.classes(me, &topic.classes, &[]);
                }
            }
        }

        self.leftovers(Level::Topic, existing.into_values().map(|t| (&t.id, t.fields.order)));
    }

    fn classes(
        &mut self,
        parent: ParentRef,
        parsed: &[curriculum_shared::Class],
        stored: &[PersistedClass],
    ) {
        let mut existing: BTreeMap<u32, &PersistedClass> =
            stored.iter().map(|c| (c.fields.order, c)).collect();

        for class in collapse(Level::Class, parsed, |c| c.fields.order) {
            let fields = NodeFields::Class(class.fields.clone());
            match existing.remove(&class.fields.order) {
                Some(old) => {
                    self.update(&old.id, &old.content_hash, fields);
                }
                None => {
                    self.create(parent.clone(), fields);
                }
            }
        }

        self.leftovers(Level::Class, existing.into_values().map(|c| (&c.id, c.fields.order)));
    }

    fn create(&mut self, parent: ParentRef, fields: NodeFields) -> ParentRef {
        debug!(level = %fields.level(), order = fields.order(), "planned create");
        self.ops.push(PlanOp::Create { parent, fields });
        ParentRef::Planned(self.ops.len() - 1)
    }

    fn update(&mut self, id: &str, stored_hash: &str, fields: NodeFields) -> ParentRef {
        let changed = fields.fingerprint() != stored_hash;
        debug!(level = %fields.level(), order = fields.order(), id, changed, "planned update");
        self.ops.push(PlanOp::Update {
            id: id.to_string(),
            fields,
            changed,
        });
        ParentRef::Existing(id.to_string())
    }

    fn leftovers<'a>(&mut self, level: Level, nodes: impl Iterator<Item = (&'a String, u32)>) {
        for (id, order) in nodes {
            match self.orphans {
                OrphanPolicy::Keep => {
                    debug!(%level, order, id = %id, "stored node not in document; kept");
                    self.untouched.push(UntouchedNode {
                        level,
                        id: id.clone(),
                        order,
                    });
                }
                OrphanPolicy::Prune => {
                    debug!(%level, order, id = %id, "stored node not in document; pruned");
                    self.ops.push(PlanOp::Delete {
                        level,
                        id: id.clone(),
                    });
                }
            }
        }
    }
}

/// Keep one node per `order`, the last one seen, in ascending order.
fn collapse<T>(level: Level, nodes: &[T], order: impl Fn(&T) -> u32) -> Vec<&T> {
    let mut by_order: BTreeMap<u32, &T> = BTreeMap::new();
    for node in nodes {
        let key = order(node);
        if by_order.insert(key, node).is_some() {
            warn!(%level, order = key, "duplicate order among siblings; last one wins");
        }
    }
    by_order.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use curriculum_outline::parse_outline;
    use curriculum_shared::{ContentType, ParseOptions, PersistedClass};
    use pretty_assertions::assert_eq;

    const SCENARIO_A: &str =
        "Course Title: Demo\nCourse ID: demo\nModule 1:\nTitle: M\nTopic 1.1:\nTitle: T\nClass 1.1.1:\nTitle: First\nContent Type: text\nText Content:\nline1\nline2\n";

    fn parse(input: &str) -> Course {
        parse_outline(input, &ParseOptions::default())
            .expect("parse")
            .course
    }

    /// Store a document the way an adapter would, with predictable ids.
    fn persist(doc: &Course) -> PersistedCourse {
        PersistedCourse {
            id: doc.id.clone().unwrap_or_else(|| "course".into()),
            fields: doc.fields.clone(),
            modules: doc
                .modules
                .iter()
                .map(|m| PersistedModule {
                    id: format!("m{}", m.fields.order),
                    content_hash: m.fields.fingerprint(),
                    fields: m.fields.clone(),
                    topics: m
                        .topics
                        .iter()
                        .map(|t| PersistedTopic {
                            id: format!("t{}.{}", m.fields.order, t.fields.order),
                            content_hash: t.fields.fingerprint(),
                            fields: t.fields.clone(),
                            classes: t
                                .classes
                                .iter()
                                .map(|c| PersistedClass {
                                    id: format!(
                                        "c{}.{}.{}",
                                        m.fields.order, t.fields.order, c.fields.order
                                    ),
                                    content_hash: c.fields.fingerprint(),
                                    fields: c.fields.clone(),
                                })
                                .collect(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn fresh_import_creates_parent_before_child() {
        let plan = reconcile(&parse(SCENARIO_A), None, OrphanPolicy::Keep);

        assert!(!plan.course.exists);
        assert!(plan.course.changed);
        assert_eq!(plan.course.id.as_deref(), Some("demo"));

        let parents: Vec<_> = plan
            .ops
            .iter()
            .map(|op| match op {
                PlanOp::Create { parent, fields } => (fields.level(), parent.clone()),
                other => panic!("unexpected op {other}"),
            })
            .collect();
        assert_eq!(
            parents,
            vec![
                (Level::Module, ParentRef::Course),
                (Level::Topic, ParentRef::Planned(0)),
                (Level::Class, ParentRef::Planned(1)),
            ]
        );
    }

    #[test]
    fn reimport_of_same_document_only_keeps() {
        let doc = parse(SCENARIO_A);
        let stored = persist(&doc);

        let first = reconcile(&doc, Some(&stored), OrphanPolicy::Keep);
        let second = reconcile(&parse(SCENARIO_A), Some(&stored), OrphanPolicy::Keep);

        assert_eq!(first, second);
        assert!(!first.course.changed);
        assert_eq!(
            first.summary(),
            PlanSummary {
                unchanged: 3,
                ..PlanSummary::default()
            }
        );
        assert_eq!(first.writes().count(), 0);
    }

    #[test]
    fn changed_class_title_updates_original_id() {
        let stored = persist(&parse(SCENARIO_A));
        let edited = parse(&SCENARIO_A.replace("Title: First", "Title: Renamed"));

        let plan = reconcile(&edited, Some(&stored), OrphanPolicy::Keep);

        assert_eq!(plan.summary().created, 0);
        let writes: Vec<_> = plan.writes().collect();
        assert_eq!(writes.len(), 1);
        match writes[0] {
            PlanOp::Update {
                id,
                fields: NodeFields::Class(fields),
                changed: true,
            } => {
                assert_eq!(id, "c1.1.1");
                assert_eq!(fields.title, "Renamed");
            }
            other => panic!("expected class update, got {other}"),
        }
    }

    #[test]
    fn identity_survives_body_and_type_changes() {
        let stored = persist(&parse(SCENARIO_A));
        let edited = parse(
            &SCENARIO_A
                .replace("Content Type: text", "Content Type: video\nVideo URL: https://v.example/1")
                .replace("line1\nline2", "entirely new body"),
        );

        let plan = reconcile(&edited, Some(&stored), OrphanPolicy::Keep);
        let class_ids: Vec<_> = plan
            .ops
            .iter()
            .filter_map(|op| match op {
                PlanOp::Update {
                    id,
                    fields: NodeFields::Class(f),
                    ..
                } => Some((id.as_str(), f.content_type)),
                _ => None,
            })
            .collect();
        assert_eq!(class_ids, vec![("c1.1.1", ContentType::Video)]);
    }

    #[test]
    fn duplicate_class_orders_collapse_last_wins() {
        let doc = parse(
            "Module 1:\nTopic 1.1:\nClass 1.1.1:\nTitle: A\nClass 1.1.1:\nTitle: B\nClass 1.1.2:\nTitle: C\n",
        );
        let plan = reconcile(&doc, None, OrphanPolicy::Keep);

        let classes: Vec<_> = plan
            .ops
            .iter()
            .filter(|op| op.level() == Level::Class)
            .map(|op| match op {
                PlanOp::Create { fields, .. } => fields.title().to_string(),
                other => panic!("unexpected op {other}"),
            })
            .collect();
        assert_eq!(classes, vec!["B", "C"]);
    }

    #[test]
    fn new_topic_under_existing_module_references_stored_id() {
        let stored = persist(&parse(SCENARIO_A));
        let extended = parse(&format!("{SCENARIO_A}Topic 1.2:\nTitle: Extra\n"));

        let plan = reconcile(&extended, Some(&stored), OrphanPolicy::Keep);
        let created: Vec<_> = plan
            .ops
            .iter()
            .filter_map(|op| match op {
                PlanOp::Create { parent, fields } => Some((parent.clone(), fields.order())),
                _ => None,
            })
            .collect();
        assert_eq!(created, vec![(ParentRef::Existing("m1".into()), 2)]);
    }

    #[test]
    fn missing_nodes_are_kept_or_pruned() {
        let two_modules = format!("{SCENARIO_A}Module 2:\nTitle: Gone soon\n");
        let stored = persist(&parse(&two_modules));
        let doc = parse(SCENARIO_A);

        let kept = reconcile(&doc, Some(&stored), OrphanPolicy::Keep);
        assert_eq!(
            kept.untouched,
            vec![UntouchedNode {
                level: Level::Module,
                id: "m2".into(),
                order: 2,
            }]
        );
        assert_eq!(kept.summary().deleted, 0);

        let pruned = reconcile(&doc, Some(&stored), OrphanPolicy::Prune);
        assert!(pruned.untouched.is_empty());
        assert_eq!(
            pruned.ops.last(),
            Some(&PlanOp::Delete {
                level: Level::Module,
                id: "m2".into(),
            })
        );
    }

    #[test]
    fn course_field_change_is_flagged() {
        let stored = persist(&parse(SCENARIO_A));
        let doc = parse(&SCENARIO_A.replace("Course Title: Demo", "Course Title: Demo 2"));
        let plan = reconcile(&doc, Some(&stored), OrphanPolicy::Keep);
        assert!(plan.course.exists);
        assert!(plan.course.changed);
        assert_eq!(plan.summary().updated, 0);
    }

    #[test]
    fn plan_serializes_with_tags() {
        let plan = reconcile(&parse(SCENARIO_A), None, OrphanPolicy::Keep);
        let json = serde_json::to_value(&plan).expect("serialize");
        assert_eq!(json["ops"][0]["op"], "create");
        assert_eq!(json["ops"][0]["parent"], "course");
        assert_eq!(json["ops"][1]["parent"]["planned"], 0);
        assert_eq!(json["ops"][2]["fields"]["level"], "class");
    }
}
