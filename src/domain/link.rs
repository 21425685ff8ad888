use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Property key flagging a link whose last processing failed
pub const DEAD_LINK_PROP: &str = "dead";
/// Property key holding the accumulated discussion list
pub const DISCUSSIONS_PROP: &str = "discussions";

/// Free-form property bag attached to every entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Properties {
    pub attributes: BTreeMap<String, Value>,
    /// Task description -> task type
    pub tasks:      BTreeMap<String, String>
}

impl Properties {
    pub fn add_attribute(&mut self, key: &str, value: impl Into<Value>) {
        self.attributes.insert(key.to_string(), value.into());
    }

    pub fn get_attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn contains_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn add_task(&mut self, description: &str, task_type: &str) {
        self.tasks.insert(description.to_string(), task_type.to_string());
    }

    pub fn clear_tasks(&mut self) {
        self.tasks.clear();
    }

    /// Decode the discussion list stored under [`DISCUSSIONS_PROP`]
    pub fn discussions(&self) -> Vec<Discussion> {
        self.get_attribute(DISCUSSIONS_PROP)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id:           String,
    pub title:        String,
    pub url:          String,
    pub source:       String,
    pub content:      Option<String>,
    pub thumbnail_id: Option<String>,
    pub props:        Properties,
    pub read:         bool,
    pub date_updated: i64
}

impl Link {
    pub fn new(id: &str, title: &str, url: &str, source: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            url: url.to_string(),
            source: source.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    Link,
    Note,
    Snippet,
    File
}

/// Minimal view of any entry, as needed by the reference and reminder workers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id:         String,
    pub entry_type: EntryType,
    pub title:      Option<String>,
    pub plain_text: Option<String>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id:         String,
    pub entry_id:   String,
    pub plain_text: String
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscussionSource {
    Reddit,
    HackerNews
}

/// An external discussion thread about a link, keyed by `url`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discussion {
    pub source:   DiscussionSource,
    pub title:    String,
    pub url:      String,
    pub score:    i64,
    pub comments: i64,
    pub created:  i64
}

/// Tag or collection proposed for a suggested link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRef {
    pub id:   String,
    pub name: String
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupMatches {
    pub tags:        Vec<GroupRef>,
    pub collections: Vec<GroupRef>
}

/// Preview returned to the caller before a link is saved
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub url:         String,
    pub title:       Option<String>,
    pub thumbnail:   Option<String>,
    pub preview:     Option<String>,
    pub keywords:    Vec<String>,
    pub tags:        Vec<GroupRef>,
    pub collections: Vec<GroupRef>
}
