//! Abstract Syntax Tree types for the topology DSL

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// AST node with source location
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// Root AST node - one parsed source unit
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TopologyModel {
    pub defaults: Option<Spanned<Defaults>>,
    pub components: Vec<Spanned<ComponentDecl>>,
    pub events: Vec<Spanned<EventDecl>>,
}

/// `defaults { ... }` block providing fallback values
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Defaults {
    pub properties: Vec<Spanned<Property>>,
}

/// Component definition: `Host(name "web" ...)`
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDecl {
    pub component_type: Spanned<String>,
    pub properties: Vec<Spanned<Property>>,
}

/// Event definition, tagged by kind
#[derive(Debug, Clone, PartialEq)]
pub struct EventDecl {
    pub kind: Spanned<EventKind>,
    pub properties: Vec<Spanned<Property>>,
}

/// Known event kinds. Each kind has its own property schema and a fixed
/// category/type mapping in the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ElementPropertiesChanged,
}

impl EventKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ElementPropertiesChanged" => Some(EventKind::ElementPropertiesChanged),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ElementPropertiesChanged => "ElementPropertiesChanged",
        }
    }
}

/// `key value` pair inside a component, event or defaults block
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: Spanned<PropertyKey>,
    pub value: Spanned<PropertyValue>,
}

/// Every property keyword the language knows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    Identifiers,
    Id,
    Name,
    Layer,
    Domain,
    Environment,
    Labels,
    Processor,
    Data,
    Relations,
    HealthMessage,
    Health,
    Repeat,
    EventProcessor,
    Tags,
    Title,
    Message,
    Links,
    Previous,
    Current,
}

impl PropertyKey {
    /// Keywords accepted inside a component definition
    pub const COMPONENT: &'static [PropertyKey] = &[
        PropertyKey::Identifiers,
        PropertyKey::Id,
        PropertyKey::Name,
        PropertyKey::Layer,
        PropertyKey::Domain,
        PropertyKey::Environment,
        PropertyKey::Labels,
        PropertyKey::Processor,
        PropertyKey::Data,
        PropertyKey::Relations,
        PropertyKey::HealthMessage,
        PropertyKey::Health,
        PropertyKey::Repeat,
    ];

    /// Keywords accepted inside an event definition
    pub const EVENT: &'static [PropertyKey] = &[
        PropertyKey::Title,
        PropertyKey::Message,
        PropertyKey::Identifiers,
        PropertyKey::Tags,
        PropertyKey::Links,
        PropertyKey::Processor,
        PropertyKey::Previous,
        PropertyKey::Current,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        let key = match s {
            "identifiers" => PropertyKey::Identifiers,
            "id" => PropertyKey::Id,
            "name" => PropertyKey::Name,
            "layer" => PropertyKey::Layer,
            "domain" => PropertyKey::Domain,
            "environment" => PropertyKey::Environment,
            "labels" => PropertyKey::Labels,
            "processor" => PropertyKey::Processor,
            "data" => PropertyKey::Data,
            "relations" => PropertyKey::Relations,
            "healthMessage" => PropertyKey::HealthMessage,
            "health" => PropertyKey::Health,
            "repeat" => PropertyKey::Repeat,
            "eventProcessor" => PropertyKey::EventProcessor,
            "tags" => PropertyKey::Tags,
            "title" => PropertyKey::Title,
            "message" => PropertyKey::Message,
            "links" => PropertyKey::Links,
            "previous" => PropertyKey::Previous,
            "current" => PropertyKey::Current,
            _ => return None,
        };
        Some(key)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKey::Identifiers => "identifiers",
            PropertyKey::Id => "id",
            PropertyKey::Name => "name",
            PropertyKey::Layer => "layer",
            PropertyKey::Domain => "domain",
            PropertyKey::Environment => "environment",
            PropertyKey::Labels => "labels",
            PropertyKey::Processor => "processor",
            PropertyKey::Data => "data",
            PropertyKey::Relations => "relations",
            PropertyKey::HealthMessage => "healthMessage",
            PropertyKey::Health => "health",
            PropertyKey::Repeat => "repeat",
            PropertyKey::EventProcessor => "eventProcessor",
            PropertyKey::Tags => "tags",
            PropertyKey::Title => "title",
            PropertyKey::Message => "message",
            PropertyKey::Links => "links",
            PropertyKey::Previous => "previous",
            PropertyKey::Current => "current",
        }
    }

    /// Whether the key may appear in a `defaults` block
    pub fn allowed_in_defaults(&self) -> bool {
        Self::COMPONENT.contains(self)
            || matches!(self, PropertyKey::EventProcessor | PropertyKey::Tags)
    }
}

impl std::fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A literal property value as written in source
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Object(Vec<ObjectMember>),
    List(Vec<Spanned<PropertyValue>>),
    /// Verbatim body of a fenced code block
    Code(String),
}

/// `key value` member of an object literal
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectMember {
    pub key: Spanned<String>,
    pub value: Spanned<PropertyValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_key_round_trip_names() {
        for key in PropertyKey::COMPONENT.iter().chain(PropertyKey::EVENT) {
            assert_eq!(PropertyKey::from_str(key.as_str()), Some(*key));
        }
    }

    #[test]
    fn test_defaults_accept_event_processor_and_tags() {
        assert!(PropertyKey::EventProcessor.allowed_in_defaults());
        assert!(PropertyKey::Tags.allowed_in_defaults());
        assert!(PropertyKey::Repeat.allowed_in_defaults());
        assert!(!PropertyKey::Title.allowed_in_defaults());
        assert!(!PropertyKey::Links.allowed_in_defaults());
    }

    #[test]
    fn test_event_kind_names() {
        assert_eq!(
            EventKind::from_str("ElementPropertiesChanged"),
            Some(EventKind::ElementPropertiesChanged)
        );
        assert_eq!(EventKind::from_str("Other"), None);
    }
}
