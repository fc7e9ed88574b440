//! Topology entities: components, relations, health states and events

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::value::{Value, ValueMap};

/// Layer/domain/environment value used when neither source nor defaults set one
pub const UNKNOWN: &str = "Unknown";

/// Relation type used when a relation item carries no `|TYPE` suffix
pub const DEFAULT_RELATION_TYPE: &str = "uses";

/// A topology node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Component {
    pub uid: String,
    #[serde(rename = "type")]
    pub component_type: String,
    pub name: String,
    pub layer: String,
    pub domain: String,
    pub environment: String,
    pub labels: Vec<String>,
    pub identifiers: Vec<String>,
    pub custom_properties: ValueMap,
    /// Relations parsed from source, waiting for the resolution pass
    #[serde(skip)]
    pub pending_relations: Vec<PendingRelation>,
}

impl Component {
    /// A blank component of the given type; every classification starts as "Unknown"
    pub fn new(component_type: impl Into<String>) -> Self {
        Self {
            uid: String::new(),
            component_type: component_type.into(),
            name: String::new(),
            layer: UNKNOWN.to_string(),
            domain: UNKNOWN.to_string(),
            environment: UNKNOWN.to_string(),
            labels: Vec::new(),
            identifiers: Vec::new(),
            custom_properties: ValueMap::new(),
            pending_relations: Vec::new(),
        }
    }

    pub fn add_label(&mut self, label: impl Into<String>) {
        self.labels.push(label.into());
    }

    /// Add an identifier unless it is already present
    pub fn add_identifier(&mut self, identifier: impl Into<String>) {
        let identifier = identifier.into();
        if !self.identifiers.contains(&identifier) {
            self.identifiers.push(identifier);
        }
    }

    /// Labels with duplicates removed, first occurrence wins
    pub fn dedup_labels(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.labels.retain(|l| seen.insert(l.clone()));
    }

    /// Identifier used to attach health states: first identifier, else the uid
    pub fn topo_identifier(&self) -> &str {
        self.identifiers.first().map(String::as_str).unwrap_or(&self.uid)
    }

    /// Read-only view handed to expressions
    pub fn to_value(&self) -> Value {
        let mut map = ValueMap::new();
        map.insert("uid".to_string(), Value::from(self.uid.as_str()));
        map.insert("type".to_string(), Value::from(self.component_type.as_str()));
        map.insert("name".to_string(), Value::from(self.name.as_str()));
        map.insert("layer".to_string(), Value::from(self.layer.as_str()));
        map.insert("domain".to_string(), Value::from(self.domain.as_str()));
        map.insert("environment".to_string(), Value::from(self.environment.as_str()));
        map.insert("labels".to_string(), Value::from(self.labels.clone()));
        map.insert("identifiers".to_string(), Value::from(self.identifiers.clone()));
        map.insert(
            "properties".to_string(),
            Value::Map(self.custom_properties.clone()),
        );
        Value::Map(map)
    }
}

/// A relation parsed from a component's `relations` list, not yet checked
/// against the graph
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRelation {
    /// uid of the component that declared the relation
    pub declared_by: String,
    /// Target as written: a uid or a component name
    pub target: String,
    pub relation_type: String,
    /// `<TARGET`: the edge points from the target to the declaring component
    pub reverse: bool,
    /// `"<source> --> <target>"` using the unresolved target text
    pub external_id: String,
}

impl PendingRelation {
    /// Parse one `<?TARGET(|TYPE)?` item declared by `declared_by`
    pub fn parse(declared_by: &str, item: &str) -> Self {
        let (reverse, rest) = match item.strip_prefix('<') {
            Some(rest) => (true, rest),
            None => (false, item),
        };
        // Only a single `|` carries a type; anything else keeps the default
        let mut parts = rest.split('|');
        let target = parts.next().unwrap_or(rest);
        let relation_type = match (parts.next(), parts.next()) {
            (Some(ty), None) => ty,
            _ => DEFAULT_RELATION_TYPE,
        };
        let external_id = if reverse {
            relation_external_id(target, declared_by)
        } else {
            relation_external_id(declared_by, target)
        };
        Self {
            declared_by: declared_by.to_string(),
            target: target.to_string(),
            relation_type: relation_type.to_string(),
            reverse,
            external_id,
        }
    }
}

/// External id of an edge: `"<source> --> <target>"`
pub fn relation_external_id(source: &str, target: &str) -> String {
    format!("{} --> {}", source, target)
}

/// A directed, typed edge between two registered components
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relation {
    pub external_id: String,
    pub source_id: String,
    pub target_id: String,
    #[serde(rename = "type")]
    pub relation_type: String,
}

impl Relation {
    pub fn new(source_id: &str, target_id: &str, relation_type: &str) -> Self {
        Self {
            external_id: relation_external_id(source_id, target_id),
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            relation_type: relation_type.to_string(),
        }
    }
}

/// Three-state health value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthValue {
    Clear,
    Deviating,
    Critical,
}

impl HealthValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthValue::Clear => "CLEAR",
            HealthValue::Deviating => "DEVIATING",
            HealthValue::Critical => "CRITICAL",
        }
    }
}

impl FromStr for HealthValue {
    type Err = String;

    /// Case-insensitive; the token is upper-cased before matching
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CLEAR" => Ok(HealthValue::Clear),
            "DEVIATING" => Ok(HealthValue::Deviating),
            "CRITICAL" => Ok(HealthValue::Critical),
            _ => Err(s.to_string()),
        }
    }
}

impl fmt::Display for HealthValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static health check result attached to a component
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthState {
    pub check_id: String,
    pub check_name: String,
    pub topo_identifier: String,
    pub value: HealthValue,
    pub message: String,
}

/// Event category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventCategory {
    Activities,
    Alerts,
    Anomalies,
    Changes,
    Others,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Activities => "Activities",
            EventCategory::Alerts => "Alerts",
            EventCategory::Anomalies => "Anomalies",
            EventCategory::Changes => "Changes",
            EventCategory::Others => "Others",
        }
    }
}

/// `{title, url}` pair parsed from a `[description](url)` link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLink {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventContext {
    pub category: EventCategory,
    pub data: ValueMap,
    pub element_identifiers: Vec<String>,
    pub source_links: Vec<SourceLink>,
}

/// A change event published alongside the topology
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub event_type: String,
    pub title: String,
    pub message: String,
    pub tags: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub context: EventContext,
}

impl Event {
    pub fn new(event_type: impl Into<String>, category: EventCategory) -> Self {
        Self {
            event_type: event_type.into(),
            title: String::new(),
            message: String::new(),
            tags: Vec::new(),
            timestamp: Utc::now(),
            context: EventContext {
                category,
                data: ValueMap::new(),
                element_identifiers: Vec::new(),
                source_links: Vec::new(),
            },
        }
    }

    /// Read-only view handed to expressions
    pub fn to_value(&self) -> Value {
        let mut map = ValueMap::new();
        map.insert("event_type".to_string(), Value::from(self.event_type.as_str()));
        map.insert("title".to_string(), Value::from(self.title.as_str()));
        map.insert("message".to_string(), Value::from(self.message.as_str()));
        map.insert("tags".to_string(), Value::from(self.tags.clone()));
        map.insert(
            "category".to_string(),
            Value::from(self.context.category.as_str()),
        );
        map.insert(
            "identifiers".to_string(),
            Value::from(self.context.element_identifiers.clone()),
        );
        map.insert("data".to_string(), Value::Map(self.context.data.clone()));
        Value::Map(map)
    }
}
