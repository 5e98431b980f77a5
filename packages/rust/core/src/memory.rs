//! In-memory [`CourseStore`] that records every write.
//!
//! Used for dry runs and tests. Behaves like the database adapter: sibling
//! orders are unique, deletes cascade, and identifiers are UUID v7.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use curriculum_shared::{
    ClassFields, CourseFields, CourseStore, CurriculumError, Fingerprint, ModuleFields,
    PersistedClass, PersistedCourse, PersistedModule, PersistedTopic, Result, TopicFields,
};

use crate::reconcile::Level;

/// One mutating call made against a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    UpsertCourse { id: String },
    Create { level: Level, parent_id: String, id: String },
    Update { level: Level, id: String },
    Delete { level: Level, id: String },
}

#[derive(Default)]
struct State {
    courses: BTreeMap<String, PersistedCourse>,
    calls: Vec<StoreCall>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing tree, e.g. one loaded from another store.
    pub fn with_course(course: PersistedCourse) -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.state.lock() {
            state.courses.insert(course.id.clone(), course);
        }
        store
    }

    /// Snapshot of a stored course.
    pub fn course(&self, id: &str) -> Option<PersistedCourse> {
        self.state.lock().ok()?.courses.get(id).cloned()
    }

    /// Every mutating call since creation or the last [`Self::clear_calls`].
    pub fn calls(&self) -> Vec<StoreCall> {
        self.state
            .lock()
            .map(|state| state.calls.clone())
            .unwrap_or_default()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.calls.clear();
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| CurriculumError::Storage("memory store lock poisoned".into()))
    }
}

impl State {
    fn module_mut(&mut self, id: &str) -> Result<&mut PersistedModule> {
        self.courses
            .values_mut()
            .flat_map(|c| c.modules.iter_mut())
            .find(|m| m.id == id)
            .ok_or_else(|| not_found(Level::Module, id))
    }

    fn topic_mut(&mut self, id: &str) -> Result<&mut PersistedTopic> {
        self.courses
            .values_mut()
            .flat_map(|c| c.modules.iter_mut())
            .flat_map(|m| m.topics.iter_mut())
            .find(|t| t.id == id)
            .ok_or_else(|| not_found(Level::Topic, id))
    }

    fn class_mut(&mut self, id: &str) -> Result<&mut PersistedClass> {
        self.courses
            .values_mut()
            .flat_map(|c| c.modules.iter_mut())
            .flat_map(|m| m.topics.iter_mut())
            .flat_map(|t| t.classes.iter_mut())
            .find(|c| c.id == id)
            .ok_or_else(|| not_found(Level::Class, id))
    }
}

fn not_found(level: Level, id: &str) -> CurriculumError {
    CurriculumError::Storage(format!("{level} {id} not found"))
}

/// Insert keeping siblings sorted by order; orders must be unique.
fn insert_sorted<T>(
    siblings: &mut Vec<T>,
    node: T,
    level: Level,
    order: impl Fn(&T) -> u32,
) -> Result<()> {
    let key = order(&node);
    match siblings.binary_search_by_key(&key, &order) {
        Ok(_) => Err(CurriculumError::Storage(format!(
            "{level} with order {key} already exists under this parent"
        ))),
        Err(at) => {
            siblings.insert(at, node);
            Ok(())
        }
    }
}

fn remove_where<T>(siblings: &mut Vec<T>, matches: impl Fn(&T) -> bool) -> bool {
    let before = siblings.len();
    siblings.retain(|node| !matches(node));
    siblings.len() != before
}

#[async_trait]
impl CourseStore for MemoryStore {
    async fn persisted_tree(&self, course_id: &str) -> Result<Option<PersistedCourse>> {
        Ok(self.state()?.courses.get(course_id).cloned())
    }

    async fn upsert_course(&self, id: Option<&str>, fields: &CourseFields) -> Result<String> {
        let mut state = self.state()?;
        let id = id.map_or_else(|| Uuid::now_v7().to_string(), str::to_string);
        state
            .courses
            .entry(id.clone())
            .and_modify(|course| course.fields = fields.clone())
            .or_insert_with(|| PersistedCourse {
                id: id.clone(),
                fields: fields.clone(),
                modules: Vec::new(),
            });
        state.calls.push(StoreCall::UpsertCourse { id: id.clone() });
        Ok(id)
    }

    async fn create_module(&self, course_id: &str, fields: &ModuleFields) -> Result<String> {
        let mut state = self.state()?;
        let id = Uuid::now_v7().to_string();
        let course = state
            .courses
            .get_mut(course_id)
            .ok_or_else(|| CurriculumError::Storage(format!("course {course_id} not found")))?;
        let module = PersistedModule {
            id: id.clone(),
            fields: fields.clone(),
            content_hash: fields.fingerprint(),
            topics: Vec::new(),
        };
        insert_sorted(&mut course.modules, module, Level::Module, |m| m.fields.order)?;
        state.calls.push(StoreCall::Create {
            level: Level::Module,
            parent_id: course_id.to_string(),
            id: id.clone(),
        });
        Ok(id)
    }

    async fn update_module(&self, id: &str, fields: &ModuleFields) -> Result<()> {
        let mut state = self.state()?;
        let module = state.module_mut(id)?;
        module.fields = fields.clone();
        module.content_hash = fields.fingerprint();
        state.calls.push(StoreCall::Update {
            level: Level::Module,
            id: id.to_string(),
        });
        Ok(())
    }

    async fn delete_module(&self, id: &str) -> Result<()> {
        let mut state = self.state()?;
        for course in state.courses.values_mut() {
            if remove_where(&mut course.modules, |m| m.id == id) {
                break;
            }
        }
        state.calls.push(StoreCall::Delete {
            level: Level::Module,
            id: id.to_string(),
        });
        Ok(())
    }

    async fn create_topic(&self, module_id: &str, fields: &TopicFields) -> Result<String> {
        let mut state = self.state()?;
        let id = Uuid::now_v7().to_string();
        let topic = PersistedTopic {
            id: id.clone(),
            fields: fields.clone(),
            content_hash: fields.fingerprint(),
            classes: Vec::new(),
        };
        let module = state.module_mut(module_id)?;
        insert_sorted(&mut module.topics, topic, Level::Topic, |t| t.fields.order)?;
        state.calls.push(StoreCall::Create {
            level: Level::Topic,
            parent_id: module_id.to_string(),
            id: id.clone(),
        });
        Ok(id)
    }

    async fn update_topic(&self, id: &str, fields: &TopicFields) -> Result<()> {
        let mut state = self.state()?;
        let topic = state.topic_mut(id)?;
        topic.fields = fields.clone();
        topic.content_hash = fields.fingerprint();
        state.calls.push(StoreCall::Update {
            level: Level::Topic,
            id: id.to_string(),
        });
        Ok(())
    }

    async fn delete_topic(&self, id: &str) -> Result<()> {
        let mut state = self.state()?;
        for module in state.courses.values_mut().flat_map(|c| c.modules.iter_mut()) {
            if remove_where(&mut module.topics, |t| t.id == id) {
                break;
            }
        }
        state.calls.push(StoreCall::Delete {
            level: Level::Topic,
            id: id.to_string(),
        });
        Ok(())
    }

    async fn create_class(&self, topic_id: &str, fields: &ClassFields) -> Result<String> {
        let mut state = self.state()?;
        let id = Uuid::now_v7().to_string();
        let class = PersistedClass {
            id: id.clone(),
            fields: fields.clone(),
            content_hash: fields.fingerprint(),
        };
        let topic = state.topic_mut(topic_id)?;
        insert_sorted(&mut topic.classes, class, Level::Class, |c| c.fields.order)?;
        state.calls.push(StoreCall::Create {
            level: Level::Class,
            parent_id: topic_id.to_string(),
            id: id.clone(),
        });
        Ok(id)
    }

    async fn update_class(&self, id: &str, fields: &ClassFields) -> Result<()> {
        let mut state = self.state()?;
        let class = state.class_mut(id)?;
        class.fields = fields.clone();
        class.content_hash = fields.fingerprint();
        state.calls.push(StoreCall::Update {
            level: Level::Class,
            id: id.to_string(),
        });
        Ok(())
    }

    async fn delete_class(&self, id: &str) -> Result<()> {
        let mut state = self.state()?;
        for topic in state
            .courses
            .values_mut()
            .flat_map(|c| c.modules.iter_mut())
            .flat_map(|m| m.topics.iter_mut())
        {
            if remove_where(&mut topic.classes, |c| c.id == id) {
                break;
            }
        }
        state.calls.push(StoreCall::Delete {
            level: Level::Class,
            id: id.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curriculum_shared::ContentType;
    use pretty_assertions::assert_eq;

    fn module(order: u32) -> ModuleFields {
        ModuleFields {
            title: format!("Module {order}"),
            order,
            ..ModuleFields::default()
        }
    }

    #[tokio::test]
    async fn children_are_kept_in_order() {
        let store = MemoryStore::new();
        let course = store
            .upsert_course(Some("c"), &CourseFields::default())
            .await
            .unwrap();
        store.create_module(&course, &module(3)).await.unwrap();
        store.create_module(&course, &module(1)).await.unwrap();

        let tree = store.persisted_tree("c").await.unwrap().unwrap();
        let orders: Vec<u32> = tree.modules.iter().map(|m| m.fields.order).collect();
        assert_eq!(orders, vec![1, 3]);
        assert_eq!(tree.modules[0].content_hash, module(1).fingerprint());
    }

    #[tokio::test]
    async fn duplicate_order_is_rejected() {
        let store = MemoryStore::new();
        store
            .upsert_course(Some("c"), &CourseFields::default())
            .await
            .unwrap();
        store.create_module("c", &module(1)).await.unwrap();
        let err = store.create_module("c", &module(1)).await.unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn delete_cascades_and_is_logged() {
        let store = MemoryStore::new();
        store
            .upsert_course(Some("c"), &CourseFields::default())
            .await
            .unwrap();
        let m = store.create_module("c", &module(1)).await.unwrap();
        let t = store
            .create_topic(&m, &TopicFields { title: "T".into(), order: 1 })
            .await
            .unwrap();
        let class = store
            .create_class(&t, &ClassFields::new(1, ContentType::Text, 300))
            .await
            .unwrap();

        store.delete_module(&m).await.unwrap();

        let tree = store.course("c").unwrap();
        assert!(tree.modules.is_empty());
        assert!(tree.find_class(&class).is_none());
        assert_eq!(
            store.calls().last(),
            Some(&StoreCall::Delete {
                level: Level::Module,
                id: m.clone(),
            })
        );
    }

    #[tokio::test]
    async fn generated_course_ids_are_uuids() {
        let store = MemoryStore::new();
        let id = store
            .upsert_course(None, &CourseFields::default())
            .await
            .unwrap();
        assert!(Uuid::parse_str(&id).is_ok());
        assert_eq!(store.calls(), vec![StoreCall::UpsertCourse { id }]);
    }
}
