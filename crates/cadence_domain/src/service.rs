use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    activity::{occurrence_key, Activity, ActivityDraft, ActivityPatch, RecurrenceRule, Todo},
    category::{Assignee, Category, CategoryMode, CategoryPatch, IconName},
    storage::{load_collection, save_collection, KeyValueStorage, MemoryStorage},
};

const ACTIVITIES_KEY: &str = "cadence.activities";
const CATEGORIES_KEY: &str = "cadence.categories";
const ASSIGNEES_KEY: &str = "cadence.assignees";

/// Owns the activity, category and assignee collections and the state
/// transition rules over them. Readers always see a fully-formed snapshot:
/// every write builds a new collection and swaps it in whole.
pub struct ActivityService {
    storage: Arc<dyn KeyValueStorage>,
    activities: RwLock<Vec<Activity>>,
    categories: RwLock<Vec<Category>>,
    assignees: RwLock<Vec<Assignee>>,
    load_advisories: Vec<String>,
}

pub struct ActivityServiceBuilder {
    storage: Option<Arc<dyn KeyValueStorage>>,
}

impl ActivityServiceBuilder {
    pub fn new() -> Self {
        Self { storage: None }
    }

    pub fn with_storage(mut self, storage: Arc<dyn KeyValueStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn build(self) -> ActivityService {
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));

        let mut load_advisories = Vec::new();
        let activities = load_collection::<Vec<Activity>>(storage.as_ref(), ACTIVITIES_KEY);
        let categories = load_collection::<Vec<Category>>(storage.as_ref(), CATEGORIES_KEY);
        let assignees = load_collection::<Vec<Assignee>>(storage.as_ref(), ASSIGNEES_KEY);
        for advisory in [activities.advisory, categories.advisory, assignees.advisory]
            .into_iter()
            .flatten()
        {
            load_advisories.push(advisory);
        }

        ActivityService {
            storage,
            activities: RwLock::new(activities.value),
            categories: RwLock::new(categories.value),
            assignees: RwLock::new(assignees.value),
            load_advisories,
        }
    }
}

impl Default for ActivityServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityService {
    pub fn builder() -> ActivityServiceBuilder {
        ActivityServiceBuilder::new()
    }

    /// Non-fatal warnings raised while loading persisted collections.
    pub fn load_advisories(&self) -> &[String] {
        &self.load_advisories
    }

    pub fn activities(&self) -> Vec<Activity> {
        self.activities.read().clone()
    }

    pub fn activity(&self, id: &str) -> Option<Activity> {
        self.activities.read().iter().find(|a| a.id == id).cloned()
    }

    #[instrument(skip(self, draft), fields(title = %draft.title))]
    pub fn create_activity(&self, draft: ActivityDraft) -> Result<Activity> {
        let activity = Activity {
            id: Uuid::new_v4().to_string(),
            title: draft.title,
            category_id: draft.category_id,
            notes: draft.notes,
            time: draft.time,
            responsible_person_id: draft.responsible_person_id,
            created_at: draft.created_at.unwrap_or_else(Utc::now),
            recurrence: draft.recurrence.unwrap_or_else(RecurrenceRule::none),
            completed: false,
            completed_occurrences: Default::default(),
            todos: draft
                .todos
                .into_iter()
                .filter(|text| !text.trim().is_empty())
                .map(Todo::new)
                .collect(),
        };

        let mut next = self.activities.read().clone();
        next.push(activity.clone());
        self.replace_activities(next)?;
        Ok(activity)
    }

    /// Partial merge. A recurrence or anchor change that invalidates the
    /// previously computed occurrence keys clears the completion ledger in
    /// the same update. Unknown ids are a silent no-op.
    #[instrument(skip(self, patch))]
    pub fn update_activity(&self, id: &str, patch: ActivityPatch) -> Result<()> {
        let mut next = self.activities.read().clone();
        let Some(activity) = next.iter_mut().find(|a| a.id == id) else {
            return Ok(());
        };

        let mut reset_ledger = false;
        if let Some(created_at) = patch.created_at {
            if created_at.date_naive() != activity.created_at.date_naive() {
                reset_ledger = true;
            }
            activity.created_at = created_at;
        }
        if let Some(recurrence) = patch.recurrence {
            if !recurrence.same_shape(&activity.recurrence) {
                reset_ledger = true;
            }
            activity.recurrence = recurrence;
        }
        if let Some(title) = patch.title {
            activity.title = title;
        }
        if let Some(category_id) = patch.category_id {
            activity.category_id = category_id;
        }
        if let Some(notes) = patch.notes {
            activity.notes = notes;
        }
        if let Some(time) = patch.time {
            activity.time = time;
        }
        if let Some(responsible_person_id) = patch.responsible_person_id {
            activity.responsible_person_id = responsible_person_id;
        }
        if let Some(todos) = patch.todos {
            activity.todos = todos;
        }
        if reset_ledger {
            activity.completed_occurrences.clear();
        }

        self.replace_activities(next)
    }

    #[instrument(skip(self))]
    pub fn delete_activity(&self, id: &str) -> Result<()> {
        let mut next = self.activities.read().clone();
        let before = next.len();
        next.retain(|a| a.id != id);
        if next.len() == before {
            return Ok(());
        }
        self.replace_activities(next)
    }

    /// Marks one occurrence of a recurring activity complete or pending.
    /// The ledger never stores `false`: un-completing removes the key.
    pub fn toggle_occurrence(
        &self,
        id: &str,
        occurrence_at: DateTime<Utc>,
        completed: bool,
    ) -> Result<()> {
        let key = occurrence_key(occurrence_at.date_naive());
        let mut next = self.activities.read().clone();
        let Some(activity) = next.iter_mut().find(|a| a.id == id) else {
            return Ok(());
        };
        if completed {
            activity.completed_occurrences.insert(key, true);
        } else {
            activity.completed_occurrences.remove(&key);
        }
        self.replace_activities(next)
    }

    /// Completion for non-recurring activities. Completing the parent marks
    /// every owned todo complete; reopening it leaves the todos untouched.
    pub fn set_completed(&self, id: &str, completed: bool) -> Result<()> {
        let mut next = self.activities.read().clone();
        let Some(activity) = next.iter_mut().find(|a| a.id == id) else {
            return Ok(());
        };
        activity.completed = completed;
        if completed {
            for todo in &mut activity.todos {
                todo.completed = true;
            }
        }
        self.replace_activities(next)
    }

    pub fn categories(&self) -> Vec<Category> {
        self.categories.read().clone()
    }

    pub fn create_category(
        &self,
        name: impl Into<String>,
        icon: IconName,
        mode: CategoryMode,
    ) -> Result<Category> {
        let category = Category::new(name, icon, mode);
        let mut next = self.categories.read().clone();
        next.push(category.clone());
        self.replace_categories(next)?;
        Ok(category)
    }

    pub fn update_category(&self, id: &str, patch: CategoryPatch) -> Result<()> {
        let mut next = self.categories.read().clone();
        let Some(category) = next.iter_mut().find(|c| c.id == id) else {
            return Ok(());
        };
        if let Some(name) = patch.name {
            category.name = name;
        }
        if let Some(icon) = patch.icon {
            category.icon = icon;
        }
        if let Some(mode) = patch.mode {
            category.mode = mode;
        }
        self.replace_categories(next)
    }

    /// Deleting a category clears the back-reference on activities that used
    /// it; the activities themselves survive.
    #[instrument(skip(self))]
    pub fn delete_category(&self, id: &str) -> Result<()> {
        let mut next = self.categories.read().clone();
        let before = next.len();
        next.retain(|c| c.id != id);
        if next.len() == before {
            return Ok(());
        }
        self.replace_categories(next)?;

        let mut activities = self.activities.read().clone();
        let mut touched = false;
        for activity in &mut activities {
            if activity.category_id.as_deref() == Some(id) {
                activity.category_id = None;
                touched = true;
            }
        }
        if touched {
            self.replace_activities(activities)?;
        }
        Ok(())
    }

    pub fn assignees(&self) -> Vec<Assignee> {
        self.assignees.read().clone()
    }

    pub fn create_assignee(&self, name: impl Into<String>) -> Result<Assignee> {
        let assignee = Assignee::new(name);
        let mut next = self.assignees.read().clone();
        next.push(assignee.clone());
        self.replace_assignees(next)?;
        Ok(assignee)
    }

    /// Deleting an assignee clears `responsible_person_id` on referencing
    /// activities, mirroring category deletion.
    #[instrument(skip(self))]
    pub fn delete_assignee(&self, id: &str) -> Result<()> {
        let mut next = self.assignees.read().clone();
        let before = next.len();
        next.retain(|a| a.id != id);
        if next.len() == before {
            return Ok(());
        }
        self.replace_assignees(next)?;

        let mut activities = self.activities.read().clone();
        let mut touched = false;
        for activity in &mut activities {
            if activity.responsible_person_id.as_deref() == Some(id) {
                activity.responsible_person_id = None;
                touched = true;
            }
        }
        if touched {
            self.replace_activities(activities)?;
        }
        Ok(())
    }
}

impl ActivityService {
    fn replace_activities(&self, next: Vec<Activity>) -> Result<()> {
        save_collection(self.storage.as_ref(), ACTIVITIES_KEY, &next)?;
        *self.activities.write() = next;
        Ok(())
    }

    fn replace_categories(&self, next: Vec<Category>) -> Result<()> {
        save_collection(self.storage.as_ref(), CATEGORIES_KEY, &next)?;
        *self.categories.write() = next;
        Ok(())
    }

    fn replace_assignees(&self, next: Vec<Assignee>) -> Result<()> {
        save_collection(self.storage.as_ref(), ASSIGNEES_KEY, &next)?;
        *self.assignees.write() = next;
        Ok(())
    }
}
