use std::collections::BTreeMap;

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::todo::{Category, Todo, TodoId};

pub const CURRENT_VERSION: u32 = 3;

pub type Collection = BTreeMap<TodoId, Todo>;

#[derive(Debug, Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    todos: &'a Collection,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    version: u32,
    #[serde(default)]
    todos: Collection,
}

/// Record shape written before the envelope existed. The category flag was
/// stored as `work`, sometimes as `category`, and `done` only appeared in the
/// second release.
#[derive(Debug, Deserialize)]
struct LegacyTodo {
    text: String,
    #[serde(default)]
    work: Option<bool>,
    #[serde(default)]
    category: Option<bool>,
    #[serde(default)]
    done: Option<bool>,
}

impl LegacyTodo {
    /// `work` wins when a record carries both spellings.
    fn work_flag(&self, id: TodoId) -> anyhow::Result<bool> {
        match (self.work, self.category) {
            (Some(work), Some(category)) if work != category => {
                warn!(%id, work, category, "legacy to-do has conflicting flags; using work");
                Ok(work)
            }
            (Some(work), _) | (None, Some(work)) => Ok(work),
            (None, None) => Err(anyhow!("legacy to-do {id} has no work/category flag")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub todos: Collection,
    /// Schema version the payload was written with.
    pub version: u32,
}

impl Decoded {
    pub fn needs_migration(&self) -> bool {
        self.version < CURRENT_VERSION
    }
}

pub fn encode_collection(todos: &Collection) -> anyhow::Result<String> {
    serde_json::to_string(&EnvelopeRef {
        version: CURRENT_VERSION,
        todos,
    })
    .context("failed to serialize to-do collection")
}

#[tracing::instrument(skip(raw))]
pub fn decode_collection(raw: &str) -> anyhow::Result<Decoded> {
    let value: Value = serde_json::from_str(raw).context("to-do collection is not valid json")?;
    let Value::Object(map) = &value else {
        return Err(anyhow!("to-do collection must be a json object"));
    };

    if map.contains_key("version") {
        let envelope: Envelope =
            serde_json::from_value(value).context("invalid to-do collection envelope")?;
        if envelope.version != CURRENT_VERSION {
            return Err(anyhow!(
                "unsupported to-do schema version {}",
                envelope.version
            ));
        }
        debug!(count = envelope.todos.len(), "decoded current schema");
        return Ok(Decoded {
            todos: envelope.todos,
            version: envelope.version,
        });
    }

    let records: BTreeMap<TodoId, Value> =
        serde_json::from_value(value).context("invalid legacy to-do collection")?;

    let mut version = 2;
    let mut todos = Collection::new();
    for (id, record) in records {
        let old: LegacyTodo = serde_json::from_value(record)
            .with_context(|| format!("invalid legacy to-do {id}"))?;
        if old.done.is_none() {
            version = 1;
        }
        let work = old.work_flag(id)?;
        todos.insert(
            id,
            Todo {
                text: old.text,
                category: Category::from_work_flag(work),
                done: old.done.unwrap_or(false),
            },
        );
    }

    info!(
        from = version,
        to = CURRENT_VERSION,
        count = todos.len(),
        "migrated legacy to-do collection"
    );
    Ok(Decoded { todos, version })
}

pub fn encode_mode(mode: Category) -> String {
    if mode.is_work() { "true" } else { "false" }.to_string()
}

pub fn decode_mode(raw: &str) -> anyhow::Result<Category> {
    let work: bool = serde_json::from_str(raw).context("active category must be a json boolean")?;
    Ok(Category::from_work_flag(work))
}
