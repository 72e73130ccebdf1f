use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TodoId(u64);

impl TodoId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Next id after `last`, taken from the millisecond clock. Never goes
    /// backwards, so key order matches creation order.
    pub fn next(last: Option<TodoId>, now: DateTime<Utc>) -> anyhow::Result<Self> {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        match last {
            Some(prev) if prev.0 >= millis => prev
                .0
                .checked_add(1)
                .map(Self)
                .ok_or_else(|| anyhow!("to-do id space exhausted")),
            _ => Ok(Self(millis)),
        }
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TodoId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| anyhow!("invalid to-do id: {s}"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Work,
    Travel,
}

impl Category {
    pub fn from_work_flag(work: bool) -> Self {
        if work { Self::Work } else { Self::Travel }
    }

    pub fn is_work(self) -> bool {
        self == Self::Work
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Work => Self::Travel,
            Self::Travel => Self::Work,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Work => "Work",
            Self::Travel => "Travel",
        }
    }

    pub fn placeholder(self) -> &'static str {
        match self {
            Self::Work => "Add a To Do",
            Self::Travel => "Where do you want to go?",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "work" => Ok(Self::Work),
            "travel" => Ok(Self::Travel),
            other => Err(anyhow!("unknown category: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub text: String,
    pub category: Category,
    #[serde(default)]
    pub done: bool,
}

impl Todo {
    pub fn new(text: String, category: Category) -> Self {
        Self {
            text,
            category,
            done: false,
        }
    }
}
