//! Property resolution with the defaults layer
//!
//! Every lookup consults the element's own properties first and falls back to
//! the `defaults` block. A null own value counts as absent. Code blocks are
//! evaluated through the sandbox before any rule applies; object and list
//! literals are converted member by member.
//!
//! Merge rules:
//!
//! - maps: the default map updated with the own map (own keys win)
//! - lists: own items followed by default items

use crate::error::SemanticError;
use crate::parser::ast::{Defaults, Property, PropertyKey, PropertyValue, Spanned};
use crate::sandbox::{self, EvalContext, Scope};
use crate::value::{Value, ValueMap};

/// Element name reported for values taken from the defaults block
pub const DEFAULT_SOURCE: &str = "default";

pub struct PropertyResolver<'m> {
    own: Vec<&'m Property>,
    defaults: Vec<&'m Property>,
    element: String,
}

impl<'m> PropertyResolver<'m> {
    pub fn new(
        own: &'m [Spanned<Property>],
        defaults: Option<&'m Defaults>,
        element: impl Into<String>,
    ) -> Self {
        Self {
            own: own.iter().map(|p| &p.node).collect(),
            defaults: defaults
                .map(|d| d.properties.iter().map(|p| &p.node).collect())
                .unwrap_or_default(),
            element: element.into(),
        }
    }

    /// Only consult the defaults block for `keys`
    pub fn with_default_keys(mut self, keys: &[PropertyKey]) -> Self {
        self.defaults.retain(|p| keys.contains(&p.key.node));
        self
    }

    /// Name of the owning element as used in error messages
    pub fn element(&self) -> &str {
        &self.element
    }

    pub fn set_element(&mut self, element: impl Into<String>) {
        self.element = element.into();
    }

    pub fn get_property(
        &self,
        key: PropertyKey,
        scope: &mut Scope<'_>,
    ) -> Result<Option<Value>, SemanticError> {
        Ok(self.lookup(key, scope)?.map(|(value, _)| value))
    }

    pub fn get_string(
        &self,
        key: PropertyKey,
        scope: &mut Scope<'_>,
    ) -> Result<Option<String>, SemanticError> {
        match self.lookup(key, scope)? {
            None => Ok(None),
            Some((Value::String(s), _)) => Ok(Some(s)),
            Some((other, source)) => Err(type_mismatch(key, "string", &other, source)),
        }
    }

    /// String property falling back to `constant` when neither layer sets it
    pub fn get_string_or(
        &self,
        key: PropertyKey,
        constant: &str,
        scope: &mut Scope<'_>,
    ) -> Result<String, SemanticError> {
        Ok(self
            .get_string(key, scope)?
            .unwrap_or_else(|| constant.to_string()))
    }

    /// String property that must be present in one of the layers
    pub fn require_string(
        &self,
        key: PropertyKey,
        scope: &mut Scope<'_>,
    ) -> Result<String, SemanticError> {
        self.get_string(key, scope)?
            .ok_or_else(|| SemanticError::MissingProperty {
                property: key.as_str().to_string(),
                element: self.element.clone(),
            })
    }

    pub fn get_int_or(
        &self,
        key: PropertyKey,
        constant: i64,
        scope: &mut Scope<'_>,
    ) -> Result<i64, SemanticError> {
        match self.lookup(key, scope)? {
            None => Ok(constant),
            Some((Value::Int(n), _)) => Ok(n),
            Some((other, source)) => Err(type_mismatch(key, "int", &other, source)),
        }
    }

    pub fn merge_map(
        &self,
        key: PropertyKey,
        scope: &mut Scope<'_>,
    ) -> Result<ValueMap, SemanticError> {
        let mut merged = match self.default_value(key, scope)? {
            None => ValueMap::new(),
            Some(Value::Map(map)) => map,
            Some(other) => return Err(type_mismatch(key, "map", &other, DEFAULT_SOURCE)),
        };
        match self.own_value(key, scope)? {
            None => {}
            Some(Value::Map(own)) => merged.extend(own),
            Some(other) => return Err(type_mismatch(key, "map", &other, &self.element)),
        }
        Ok(merged)
    }

    pub fn merge_list(
        &self,
        key: PropertyKey,
        scope: &mut Scope<'_>,
    ) -> Result<Vec<Value>, SemanticError> {
        let defaults = match self.default_value(key, scope)? {
            None => Vec::new(),
            Some(Value::List(items)) => items,
            Some(other) => return Err(type_mismatch(key, "list", &other, DEFAULT_SOURCE)),
        };
        match self.own_value(key, scope)? {
            None => Ok(defaults),
            Some(Value::List(mut own)) => {
                own.extend(defaults);
                Ok(own)
            }
            Some(other) => Err(type_mismatch(key, "list", &other, &self.element)),
        }
    }

    /// [`merge_list`](Self::merge_list) where every item must be a string
    pub fn merge_string_list(
        &self,
        key: PropertyKey,
        scope: &mut Scope<'_>,
    ) -> Result<Vec<String>, SemanticError> {
        self.merge_list(key, scope)?
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                other => Err(type_mismatch(key, "string", &other, &self.element)),
            })
            .collect()
    }

    /// Run the element's own processor block, then the defaults' one.
    /// Non-code values under a processor key are ignored.
    pub fn run_processors(
        &self,
        own_key: PropertyKey,
        default_key: PropertyKey,
        scope: &mut Scope<'_>,
    ) -> Result<(), SemanticError> {
        let layers = [
            (&self.own, own_key, self.element.as_str()),
            (&self.defaults, default_key, DEFAULT_SOURCE),
        ];
        for (properties, key, source) in layers {
            match find(properties, key) {
                Some(PropertyValue::Code(code)) => {
                    let context = EvalContext {
                        property: key.as_str(),
                        element: source,
                    };
                    sandbox::evaluate(code, scope, &context)?;
                }
                Some(_) => {
                    tracing::debug!(property = %key, element = source, "processor is not a code block, skipped")
                }
                None => {}
            }
        }
        Ok(())
    }

    /// Own value, else default value, tagged with the layer it came from
    fn lookup(
        &self,
        key: PropertyKey,
        scope: &mut Scope<'_>,
    ) -> Result<Option<(Value, &str)>, SemanticError> {
        if let Some(value) = self.own_value(key, scope)? {
            return Ok(Some((value, self.element.as_str())));
        }
        Ok(self
            .default_value(key, scope)?
            .map(|value| (value, DEFAULT_SOURCE)))
    }

    fn own_value(
        &self,
        key: PropertyKey,
        scope: &mut Scope<'_>,
    ) -> Result<Option<Value>, SemanticError> {
        match find(&self.own, key) {
            Some(value) => Ok(present(self.convert(value, key, &self.element, scope)?)),
            None => Ok(None),
        }
    }

    fn default_value(
        &self,
        key: PropertyKey,
        scope: &mut Scope<'_>,
    ) -> Result<Option<Value>, SemanticError> {
        match find(&self.defaults, key) {
            Some(value) => Ok(present(self.convert(value, key, DEFAULT_SOURCE, scope)?)),
            None => Ok(None),
        }
    }

    fn convert(
        &self,
        value: &PropertyValue,
        key: PropertyKey,
        source: &str,
        scope: &mut Scope<'_>,
    ) -> Result<Value, SemanticError> {
        match value {
            PropertyValue::Code(code) => {
                let context = EvalContext {
                    property: key.as_str(),
                    element: source,
                };
                sandbox::evaluate(code, scope, &context)
            }
            PropertyValue::Object(members) => {
                let mut map = ValueMap::new();
                for member in members {
                    let converted = self.convert(&member.value.node, key, source, scope)?;
                    map.insert(member.key.node.clone(), converted);
                }
                Ok(Value::Map(map))
            }
            PropertyValue::List(items) => items
                .iter()
                .map(|item| self.convert(&item.node, key, source, scope))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            scalar => Ok(Value::from_literal(scalar)),
        }
    }
}

/// A key given more than once takes its last value
fn find<'m>(properties: &[&'m Property], key: PropertyKey) -> Option<&'m PropertyValue> {
    properties
        .iter()
        .rev()
        .find(|p| p.key.node == key)
        .map(|p| &p.value.node)
}

fn present(value: Value) -> Option<Value> {
    (!value.is_null()).then_some(value)
}

fn type_mismatch(key: PropertyKey, expected: &'static str, found: &Value, source: &str) -> SemanticError {
    SemanticError::TypeMismatch {
        property: key.as_str().to_string(),
        expected,
        found: found.type_name(),
        source_name: source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TopologyGraph;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    /// Parse a document with defaults and a single component
    fn model(source: &str) -> crate::parser::TopologyModel {
        parse(source).expect("Should parse")
    }

    fn resolver(model: &crate::parser::TopologyModel) -> PropertyResolver<'_> {
        PropertyResolver::new(
            &model.components[0].node.properties,
            model.defaults.as_ref().map(|d| &d.node),
            "web",
        )
    }

    #[test]
    fn test_map_merge_own_keys_win() {
        let m = model(
            "defaults { data { a 2, b 3 } }\ncomponents { Host(name web data { a 1 }) }",
        );
        let graph = TopologyGraph::new();
        let merged = resolver(&m)
            .merge_map(PropertyKey::Data, &mut Scope::new(&graph))
            .unwrap();
        let expected: ValueMap = [("a".to_string(), Value::Int(1)), ("b".to_string(), Value::Int(3))]
            .into_iter()
            .collect();
        assert_eq!(merged, expected);
    }

    #[test]
    fn test_list_merge_own_items_first() {
        let m = model("defaults { labels [\"y\"] }\ncomponents { Host(name web labels [\"x\"]) }");
        let graph = TopologyGraph::new();
        let merged = resolver(&m)
            .merge_string_list(PropertyKey::Labels, &mut Scope::new(&graph))
            .unwrap();
        assert_eq!(merged, vec!["x", "y"]);
    }

    #[test]
    fn test_merge_without_own_value_returns_defaults() {
        let m = model("defaults { labels [\"y\"] data { k 1 } }\ncomponents { Host(name web) }");
        let graph = TopologyGraph::new();
        let r = resolver(&m);
        let mut scope = Scope::new(&graph);
        assert_eq!(r.merge_string_list(PropertyKey::Labels, &mut scope).unwrap(), vec!["y"]);
        assert_eq!(r.merge_map(PropertyKey::Data, &mut scope).unwrap().len(), 1);
        assert!(r.merge_list(PropertyKey::Relations, &mut scope).unwrap().is_empty());
    }

    #[test]
    fn test_scalar_fallback_chain() {
        let m = model("defaults { layer Hosts }\ncomponents { Host(name web domain Shop) }");
        let graph = TopologyGraph::new();
        let r = resolver(&m);
        let mut scope = Scope::new(&graph);
        assert_eq!(r.get_string_or(PropertyKey::Domain, "Unknown", &mut scope).unwrap(), "Shop");
        assert_eq!(r.get_string_or(PropertyKey::Layer, "Unknown", &mut scope).unwrap(), "Hosts");
        assert_eq!(
            r.get_string_or(PropertyKey::Environment, "Unknown", &mut scope).unwrap(),
            "Unknown"
        );
        assert_eq!(r.get_property(PropertyKey::Id, &mut scope).unwrap(), None);
    }

    #[test]
    fn test_null_own_value_falls_through_to_default() {
        let m = model("defaults { layer Hosts }\ncomponents { Host(name web layer ```null```) }");
        let graph = TopologyGraph::new();
        let layer = resolver(&m)
            .get_string(PropertyKey::Layer, &mut Scope::new(&graph))
            .unwrap();
        assert_eq!(layer.as_deref(), Some("Hosts"));
    }

    #[test]
    fn test_type_mismatch_names_source() {
        let m = model("defaults { layer 3 }\ncomponents { Host(name web labels \"x\") }");
        let graph = TopologyGraph::new();
        let r = resolver(&m);
        let mut scope = Scope::new(&graph);
        assert_eq!(
            r.get_string(PropertyKey::Layer, &mut scope).unwrap_err(),
            SemanticError::TypeMismatch {
                property: "layer".to_string(),
                expected: "string",
                found: "int",
                source_name: "default".to_string(),
            }
        );
        assert!(matches!(
            r.merge_list(PropertyKey::Labels, &mut scope),
            Err(SemanticError::TypeMismatch { expected: "list", .. })
        ));
    }

    #[test]
    fn test_missing_required_property() {
        let m = model("components { Host(layer x) }");
        let graph = TopologyGraph::new();
        assert_eq!(
            resolver(&m)
                .require_string(PropertyKey::Name, &mut Scope::new(&graph))
                .unwrap_err(),
            SemanticError::MissingProperty {
                property: "name".to_string(),
                element: "web".to_string(),
            }
        );
    }

    #[test]
    fn test_code_inside_list_is_evaluated() {
        let m = model("components { Host(name web labels [\"a\", ```'b' + str(repeat_index)```]) }");
        let graph = TopologyGraph::new();
        let mut component = crate::graph::Component::new("Host");
        let labels = resolver(&m)
            .merge_string_list(
                PropertyKey::Labels,
                &mut Scope::for_component(&graph, &mut component, 4),
            )
            .unwrap();
        assert_eq!(labels, vec!["a", "b4"]);
    }

    #[test]
    fn test_last_duplicate_key_wins() {
        let m = model("components { Host(name first name second) }");
        let graph = TopologyGraph::new();
        assert_eq!(
            resolver(&m)
                .require_string(PropertyKey::Name, &mut Scope::new(&graph))
                .unwrap(),
            "second"
        );
    }

    #[test]
    fn test_processors_run_own_then_default() {
        let m = model(
            "defaults { processor ```component.add_label('from-default')``` }\n\
             components { Host(name web processor ```component.add_label('own')```) }",
        );
        let graph = TopologyGraph::new();
        let mut component = crate::graph::Component::new("Host");
        resolver(&m)
            .run_processors(
                PropertyKey::Processor,
                PropertyKey::Processor,
                &mut Scope::for_component(&graph, &mut component, 0),
            )
            .unwrap();
        assert_eq!(component.labels, vec!["own", "from-default"]);
    }

    #[test]
    fn test_restricted_default_keys() {
        let m = model("defaults { tags [\"t\"] identifiers [\"i\"] }\ncomponents { Host(name web) }");
        let graph = TopologyGraph::new();
        let r = resolver(&m).with_default_keys(&[PropertyKey::Tags]);
        let mut scope = Scope::new(&graph);
        assert_eq!(r.merge_string_list(PropertyKey::Tags, &mut scope).unwrap(), vec!["t"]);
        assert!(r
            .merge_string_list(PropertyKey::Identifiers, &mut scope)
            .unwrap()
            .is_empty());
    }
}
