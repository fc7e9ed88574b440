//! Component definitions: repeat expansion, property resolution, relations

use crate::error::SemanticError;
use crate::graph::{Component, HealthState, PendingRelation, TopologyGraph, UNKNOWN};
use crate::parser::ast::{ComponentDecl, Defaults, PropertyKey};
use crate::sandbox::Scope;

use super::health::{health_state, DEFAULT_HEALTH};
use super::properties::PropertyResolver;

/// Uid for a component without an `id`: `urn:<type>:<name>`, lower-cased
pub fn synthesize_uid(component_type: &str, name: &str) -> String {
    format!("urn:{}:{}", component_type.to_lowercase(), name.to_lowercase())
}

/// Interpret one definition and register every instance it expands to.
///
/// Returns the number of registered components.
pub fn interpret_component(
    graph: &mut TopologyGraph,
    decl: &ComponentDecl,
    defaults: Option<&Defaults>,
) -> Result<usize, SemanticError> {
    let component_type = decl.component_type.node.as_str();
    let mut props = PropertyResolver::new(&decl.properties, defaults, component_type);

    let repeat = {
        let mut scratch = Component::new(component_type);
        props.get_int_or(
            PropertyKey::Repeat,
            1,
            &mut Scope::for_component(graph, &mut scratch, 0),
        )?
    };
    if repeat < 0 {
        return Err(SemanticError::InvalidValue {
            property: PropertyKey::Repeat.as_str().to_string(),
            element: component_type.to_string(),
            reason: format!("repeat count must not be negative, got {}", repeat),
        });
    }

    for repeat_index in 0..repeat {
        props.set_element(component_type);
        let (component, health) = build(graph, &mut props, component_type, repeat_index)?;
        graph.add_component(component)?;
        graph.set_health(health);
    }
    Ok(repeat as usize)
}

/// Component under construction plus what its expressions may see
struct Builder<'g> {
    graph: &'g TopologyGraph,
    component: Component,
    repeat_index: i64,
}

impl Builder<'_> {
    fn scope(&mut self) -> Scope<'_> {
        Scope::for_component(self.graph, &mut self.component, self.repeat_index)
    }
}

fn build(
    graph: &TopologyGraph,
    props: &mut PropertyResolver<'_>,
    component_type: &str,
    repeat_index: i64,
) -> Result<(Component, HealthState), SemanticError> {
    let mut b = Builder {
        graph,
        component: Component::new(component_type),
        repeat_index,
    };

    let name = props.require_string(PropertyKey::Name, &mut b.scope())?;
    props.set_element(name.as_str());
    b.component.name = name;

    let data = props.merge_map(PropertyKey::Data, &mut b.scope())?;
    b.component.custom_properties.extend(data);

    let layer = props.get_string_or(PropertyKey::Layer, UNKNOWN, &mut b.scope())?;
    b.component.layer = layer;
    let domain = props.get_string_or(PropertyKey::Domain, UNKNOWN, &mut b.scope())?;
    b.component.domain = domain;
    let environment = props.get_string_or(PropertyKey::Environment, UNKNOWN, &mut b.scope())?;
    b.component.environment = environment;

    let labels = props.merge_string_list(PropertyKey::Labels, &mut b.scope())?;
    b.component.labels.extend(labels);

    let uid = match props.get_string(PropertyKey::Id, &mut b.scope())? {
        Some(uid) => uid,
        None => synthesize_uid(component_type, &b.component.name),
    };
    b.component.uid = uid;

    let identifiers = props.merge_string_list(PropertyKey::Identifiers, &mut b.scope())?;
    for identifier in identifiers {
        b.component.add_identifier(identifier);
    }
    if b.component.identifiers.is_empty() {
        let uid = b.component.uid.clone();
        b.component.identifiers.push(uid);
    }

    props.run_processors(PropertyKey::Processor, PropertyKey::Processor, &mut b.scope())?;

    let health = props.get_string_or(PropertyKey::Health, DEFAULT_HEALTH, &mut b.scope())?;
    let message = props.get_string_or(PropertyKey::HealthMessage, "", &mut b.scope())?;
    let health = health_state(&b.component, &health, message)?;

    let relations = props.merge_string_list(PropertyKey::Relations, &mut b.scope())?;
    let Builder { mut component, .. } = b;
    component.pending_relations = relations
        .iter()
        .map(|item| PendingRelation::parse(&component.uid, item))
        .collect();

    Ok((component, health))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn interpret(source: &str) -> Result<TopologyGraph, SemanticError> {
        let model = parse(source).expect("Should parse");
        let mut graph = TopologyGraph::new();
        let defaults = model.defaults.as_ref().map(|d| &d.node);
        for decl in &model.components {
            interpret_component(&mut graph, &decl.node, defaults)?;
        }
        Ok(graph)
    }

    #[test]
    fn test_uid_synthesized_and_seeded_into_identifiers() {
        let graph = interpret("components { Web.Server(name Front) }").unwrap();
        let c = graph.component("urn:web.server:front").unwrap();
        assert_eq!(c.component_type, "Web.Server");
        assert_eq!(c.identifiers, vec!["urn:web.server:front"]);
        assert_eq!(c.layer, "Unknown");
    }

    #[test]
    fn test_repeat_expands_with_index() {
        let graph = interpret(
            "components { Host(repeat 3 name ```'web-' + str(repeat_index)```) }",
        )
        .unwrap();
        let uids: Vec<_> = graph.components().map(|c| c.uid.as_str()).collect();
        assert_eq!(uids, vec!["urn:host:web-0", "urn:host:web-1", "urn:host:web-2"]);
    }

    #[test]
    fn test_repeat_zero_and_negative() {
        assert_eq!(
            interpret("components { Host(repeat 0 name a) }")
                .unwrap()
                .component_count(),
            0
        );
        assert!(matches!(
            interpret("components { Host(repeat -1 name a) }"),
            Err(SemanticError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_repeat_without_distinct_names_collides() {
        assert_eq!(
            interpret("components { Host(repeat 2 name a) }").unwrap_err(),
            SemanticError::DuplicateComponent {
                uid: "urn:host:a".to_string()
            }
        );
    }

    #[test]
    fn test_missing_name() {
        assert_eq!(
            interpret("components { Host(id x) }").unwrap_err(),
            SemanticError::MissingProperty {
                property: "name".to_string(),
                element: "Host".to_string(),
            }
        );
    }

    #[test]
    fn test_defaults_layering_and_processor() {
        let graph = interpret(
            "defaults {\n\
               layer Hosts\n\
               labels [\"managed\"]\n\
               data { owner ops, tier 1 }\n\
               processor ```component.add_label_kv('env', component.environment)```\n\
             }\n\
             components {\n\
               Host(name web id \"urn:web\" environment Prod labels [\"edge\"] data { tier 2 }\n\
                    processor ```component.set_property('named', component.name)```)\n\
             }",
        )
        .unwrap();
        let c = graph.component("urn:web").unwrap();
        assert_eq!(c.layer, "Hosts");
        assert_eq!(c.labels, vec!["edge", "managed", "env:Prod"]);
        assert_eq!(c.custom_properties["owner"].as_str(), Some("ops"));
        assert_eq!(c.custom_properties["tier"].as_int(), Some(2));
        assert_eq!(c.custom_properties["named"].as_str(), Some("web"));
    }

    #[test]
    fn test_health_derived_per_component() {
        let graph = interpret(
            "components { Host(name web identifiers [\"id-web\"] health \"Disk|critical\" healthMessage \"full\") }",
        )
        .unwrap();
        let state = graph.health_state("web_static_states").unwrap();
        assert_eq!(state.check_name, "Disk");
        assert_eq!(state.value, crate::graph::HealthValue::Critical);
        assert_eq!(state.topo_identifier, "id-web");
        assert_eq!(state.message, "full");
    }

    #[test]
    fn test_relations_left_pending() {
        let graph = interpret("components { Host(name web relations [\"db|reads\", \"<lb\"]) }").unwrap();
        let c = graph.component("urn:host:web").unwrap();
        assert_eq!(c.pending_relations.len(), 2);
        assert_eq!(c.pending_relations[0].relation_type, "reads");
        assert!(c.pending_relations[1].reverse);
        assert_eq!(graph.relation_count(), 0);
    }

    #[test]
    fn test_expression_sees_earlier_components() {
        let graph = interpret(
            "components {\n\
               Host(name db layer Databases)\n\
               Host(name web layer ```graph.component_by_name('db').layer```)\n\
             }",
        )
        .unwrap();
        assert_eq!(graph.component("urn:host:web").unwrap().layer, "Databases");
    }
}
