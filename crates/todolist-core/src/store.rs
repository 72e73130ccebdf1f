use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::confirm::{Confirm, Prompt};
use crate::schema::{self, Collection};
use crate::storage::{KeyValueStore, MODE_KEY, TODOS_KEY};
use crate::todo::{Category, Todo, TodoId};

/// Behaviour switches read from config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    /// Fail `load` on unreadable or malformed slots instead of starting empty.
    pub strict_load: bool,
    /// Reject edits that leave a to-do with empty text.
    pub require_edit_text: bool,
    /// Keep the active category across restarts.
    pub persist_mode: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            strict_load: false,
            require_edit_text: false,
            persist_mode: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Cancelled,
    Missing,
}

/// The to-do collection plus the active category, mirrored to two storage
/// slots. Every mutation writes its slot before returning.
#[derive(Debug)]
pub struct TodoStore<S> {
    storage: S,
    settings: StoreSettings,
    mode: Category,
    todos: Collection,
}

impl<S: KeyValueStore> TodoStore<S> {
    #[tracing::instrument(skip(storage))]
    pub fn load(storage: S, settings: StoreSettings) -> anyhow::Result<Self> {
        let todos = load_slot(&storage, TODOS_KEY, settings.strict_load, |raw| {
            let decoded = schema::decode_collection(raw)?;
            if decoded.needs_migration() {
                info!(
                    version = decoded.version,
                    "legacy collection will be rewritten on next change"
                );
            }
            Ok(decoded.todos)
        })?
        .unwrap_or_default();

        let mode = if settings.persist_mode {
            load_slot(&storage, MODE_KEY, settings.strict_load, schema::decode_mode)?
                .unwrap_or_default()
        } else {
            debug!("mode persistence disabled; starting in Work");
            Category::default()
        };

        info!(count = todos.len(), mode = %mode, "loaded to-do store");
        Ok(Self {
            storage,
            settings,
            mode,
            todos,
        })
    }

    pub fn settings(&self) -> StoreSettings {
        self.settings
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn mode(&self) -> Category {
        self.mode
    }

    #[tracing::instrument(skip(self))]
    pub fn set_mode(&mut self, mode: Category) -> anyhow::Result<()> {
        self.mode = mode;
        if !self.settings.persist_mode {
            return Ok(());
        }
        self.storage
            .set_item(MODE_KEY, &schema::encode_mode(mode))
            .context("failed to save active category")
    }

    /// Creates a to-do in the active category. Empty text is ignored.
    #[tracing::instrument(skip(self, text, now))]
    pub fn add(&mut self, text: &str, now: DateTime<Utc>) -> anyhow::Result<Option<TodoId>> {
        if text.is_empty() {
            debug!("ignoring empty to-do text");
            return Ok(None);
        }

        let last = self.todos.keys().next_back().copied();
        let id = TodoId::next(last, now)?;
        self.todos
            .insert(id, Todo::new(text.to_string(), self.mode));
        self.persist_todos()?;

        debug!(%id, category = %self.mode, count = self.todos.len(), "to-do added");
        Ok(Some(id))
    }

    #[tracing::instrument(skip(self, confirm))]
    pub fn delete(
        &mut self,
        id: TodoId,
        confirm: &mut dyn Confirm,
    ) -> anyhow::Result<DeleteOutcome> {
        if !confirm.confirm(&Prompt::delete_todo())? {
            debug!(%id, "delete cancelled");
            return Ok(DeleteOutcome::Cancelled);
        }

        if self.todos.remove(&id).is_none() {
            debug!(%id, "delete of unknown id ignored");
            return Ok(DeleteOutcome::Missing);
        }

        self.persist_todos()?;
        Ok(DeleteOutcome::Deleted)
    }

    /// Flips the completion flag and returns its new value.
    #[tracing::instrument(skip(self))]
    pub fn toggle_done(&mut self, id: TodoId) -> anyhow::Result<bool> {
        let todo = self
            .todos
            .get_mut(&id)
            .ok_or_else(|| anyhow!("to-do not found: {id}"))?;
        todo.done = !todo.done;
        let done = todo.done;

        self.persist_todos()?;
        Ok(done)
    }

    #[tracing::instrument(skip(self, text))]
    pub fn edit_text(&mut self, id: TodoId, text: &str) -> anyhow::Result<()> {
        if self.settings.require_edit_text && text.is_empty() {
            return Err(anyhow!("to-do text cannot be empty"));
        }

        let todo = self
            .todos
            .get_mut(&id)
            .ok_or_else(|| anyhow!("to-do not found: {id}"))?;
        if text.is_empty() {
            warn!(%id, "to-do text edited to empty");
        }
        todo.text = text.to_string();

        self.persist_todos()
    }

    /// To-dos of one category, oldest first.
    pub fn list(&self, category: Category) -> Vec<(TodoId, &Todo)> {
        self.todos
            .iter()
            .filter(|(_, todo)| todo.category == category)
            .map(|(id, todo)| (*id, todo))
            .collect()
    }

    pub fn visible(&self) -> Vec<(TodoId, &Todo)> {
        self.list(self.mode)
    }

    pub fn get(&self, id: TodoId) -> Option<&Todo> {
        self.todos.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TodoId, &Todo)> {
        self.todos.iter().map(|(id, todo)| (*id, todo))
    }

    pub fn len(&self) -> usize {
        self.todos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.todos.is_empty()
    }

    fn persist_todos(&self) -> anyhow::Result<()> {
        let payload = schema::encode_collection(&self.todos)?;
        self.storage
            .set_item(TODOS_KEY, &payload)
            .context("failed to save to-do list")
    }
}

/// Reads one slot. In lenient mode read and parse failures are logged and
/// treated as an absent slot.
fn load_slot<S, T, F>(storage: &S, key: &str, strict: bool, parse: F) -> anyhow::Result<Option<T>>
where
    S: KeyValueStore,
    F: FnOnce(&str) -> anyhow::Result<T>,
{
    let raw = match storage.get_item(key) {
        Ok(raw) => raw,
        Err(err) if !strict => {
            error!(key, error = %format!("{err:#}"), "failed reading slot; using default");
            return Ok(None);
        }
        Err(err) => return Err(err.context(format!("failed reading slot {key}"))),
    };

    let Some(raw) = raw else {
        debug!(key, "slot empty; using default");
        return Ok(None);
    };

    match parse(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(err) if !strict => {
            error!(key, error = %format!("{err:#}"), "malformed slot; using default");
            Ok(None)
        }
        Err(err) => Err(err.context(format!("malformed slot {key}"))),
    }
}
