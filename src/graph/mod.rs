//! The topology graph under construction
//!
//! One [`TopologyGraph`] is shared by every source unit of a run. Components
//! are registered with fail-fast uniqueness checks, pending relations are
//! turned into edges by the [`resolver`] pass, and the finished graph is
//! handed out as an immutable [`TopologySnapshot`].

mod model;
pub mod resolver;
mod snapshot;

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::error::SemanticError;

pub use model::{
    relation_external_id, Component, Event, EventCategory, EventContext, HealthState,
    HealthValue, PendingRelation, Relation, SourceLink, DEFAULT_RELATION_TYPE, UNKNOWN,
};
pub use snapshot::TopologySnapshot;

/// Mutable store of components, relations, health states and events
#[derive(Debug, Default)]
pub struct TopologyGraph {
    components: IndexMap<String, Component>,
    /// name -> uids of every component carrying that name
    names: HashMap<String, Vec<String>>,
    relations: IndexMap<String, Relation>,
    health: IndexMap<String, HealthState>,
    events: Vec<Event>,
}

impl TopologyGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component; its uid must not be present yet
    pub fn add_component(&mut self, component: Component) -> Result<(), SemanticError> {
        if self.components.contains_key(&component.uid) {
            return Err(SemanticError::DuplicateComponent {
                uid: component.uid.clone(),
            });
        }
        tracing::debug!(uid = %component.uid, name = %component.name, "registered component");
        self.names
            .entry(component.name.clone())
            .or_default()
            .push(component.uid.clone());
        self.components.insert(component.uid.clone(), component);
        Ok(())
    }

    pub fn component(&self, uid: &str) -> Option<&Component> {
        self.components.get(uid)
    }

    pub fn component_exists(&self, uid: &str) -> bool {
        self.components.contains_key(uid)
    }

    /// Look a component up by name. More than one match is an error.
    pub fn component_by_name(&self, name: &str) -> Result<Option<&Component>, SemanticError> {
        match self.names.get(name).map(Vec::as_slice) {
            None | Some([]) => Ok(None),
            Some([uid]) => Ok(self.components.get(uid)),
            Some(uids) => Err(SemanticError::AmbiguousName {
                name: name.to_string(),
                count: uids.len(),
            }),
        }
    }

    /// Look a component up by type and name. More than one match is an error.
    pub fn component_by_name_and_type(
        &self,
        component_type: &str,
        name: &str,
    ) -> Result<Option<&Component>, SemanticError> {
        let mut matches = self
            .names
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|uid| self.components.get(uid))
            .filter(|c| c.component_type == component_type);
        match (matches.next(), matches.next()) {
            (None, _) => Ok(None),
            (Some(found), None) => Ok(Some(found)),
            (Some(_), Some(_)) => Err(SemanticError::AmbiguousName {
                name: format!("{} {}", component_type, name),
                count: 2 + matches.count(),
            }),
        }
    }

    /// Add an edge keyed by its external id; duplicates are rejected
    pub fn add_relation(
        &mut self,
        source_id: &str,
        target_id: &str,
        relation_type: &str,
    ) -> Result<&Relation, SemanticError> {
        let relation = Relation::new(source_id, target_id, relation_type);
        if self.relations.contains_key(&relation.external_id) {
            return Err(SemanticError::DuplicateRelation {
                external_id: relation.external_id,
            });
        }
        let key = relation.external_id.clone();
        let stored: &Relation = self.relations.entry(key).or_insert(relation);
        Ok(stored)
    }

    /// Store a health state. A later state with the same check id replaces the earlier one.
    pub fn set_health(&mut self, state: HealthState) {
        if let Some(previous) = self.health.get(&state.check_id) {
            tracing::warn!(
                check_id = %state.check_id,
                previous = %previous.topo_identifier,
                current = %state.topo_identifier,
                "health state overwritten by a later component"
            );
        }
        self.health.insert(state.check_id.clone(), state);
    }

    pub fn add_event(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    pub(crate) fn components_mut(&mut self) -> impl Iterator<Item = &mut Component> {
        self.components.values_mut()
    }

    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.values()
    }

    pub fn relation(&self, external_id: &str) -> Option<&Relation> {
        self.relations.get(external_id)
    }

    pub fn health_states(&self) -> impl Iterator<Item = &HealthState> {
        self.health.values()
    }

    pub fn health_state(&self, check_id: &str) -> Option<&HealthState> {
        self.health.get(check_id)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    /// Whether any registered component still carries unresolved relations
    pub fn has_pending_relations(&self) -> bool {
        self.components.values().any(|c| !c.pending_relations.is_empty())
    }

    /// Immutable copy for the publishing side, labels de-duplicated
    pub fn snapshot(&self) -> TopologySnapshot {
        TopologySnapshot::from_graph(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(uid: &str, name: &str) -> Component {
        let mut c = Component::new("Host");
        c.uid = uid.to_string();
        c.name = name.to_string();
        c
    }

    #[test]
    fn test_duplicate_uid_rejected() {
        let mut graph = TopologyGraph::new();
        graph.add_component(component("urn:a", "a")).unwrap();
        let err = graph.add_component(component("urn:a", "other")).unwrap_err();
        assert_eq!(
            err,
            SemanticError::DuplicateComponent {
                uid: "urn:a".to_string()
            }
        );
        assert_eq!(graph.component_count(), 1);
    }

    #[test]
    fn test_name_lookup_unique_missing_and_ambiguous() {
        let mut graph = TopologyGraph::new();
        graph.add_component(component("urn:1", "web")).unwrap();
        graph.add_component(component("urn:2", "db")).unwrap();
        graph.add_component(component("urn:3", "db")).unwrap();

        assert_eq!(graph.component_by_name("web").unwrap().unwrap().uid, "urn:1");
        assert!(graph.component_by_name("cache").unwrap().is_none());
        assert!(matches!(
            graph.component_by_name("db"),
            Err(SemanticError::AmbiguousName { count: 2, .. })
        ));
    }

    #[test]
    fn test_name_and_type_lookup() {
        let mut graph = TopologyGraph::new();
        graph.add_component(component("urn:1", "db")).unwrap();
        let mut service = component("urn:2", "db");
        service.component_type = "Service".to_string();
        graph.add_component(service).unwrap();
        graph.add_component(component("urn:3", "cache")).unwrap();
        graph.add_component(component("urn:4", "cache")).unwrap();

        assert_eq!(
            graph.component_by_name_and_type("Service", "db").unwrap().unwrap().uid,
            "urn:2"
        );
        assert_eq!(
            graph.component_by_name_and_type("Host", "db").unwrap().unwrap().uid,
            "urn:1"
        );
        assert!(graph
            .component_by_name_and_type("Service", "cache")
            .unwrap()
            .is_none());
        assert!(matches!(
            graph.component_by_name_and_type("Host", "cache"),
            Err(SemanticError::AmbiguousName { count: 2, .. })
        ));
    }

    #[test]
    fn test_name_lookup_is_case_sensitive() {
        let mut graph = TopologyGraph::new();
        graph.add_component(component("urn:1", "Web")).unwrap();
        assert!(graph.component_by_name("web").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_relation_rejected() {
        let mut graph = TopologyGraph::new();
        let rel = graph.add_relation("a", "b", "uses").unwrap();
        assert_eq!(rel.external_id, "a --> b");
        let err = graph.add_relation("a", "b", "calls").unwrap_err();
        assert_eq!(
            err,
            SemanticError::DuplicateRelation {
                external_id: "a --> b".to_string()
            }
        );
    }

    #[test]
    fn test_health_last_write_wins() {
        let mut graph = TopologyGraph::new();
        let state = |ident: &str, value| HealthState {
            check_id: "web_static_states".to_string(),
            check_name: "HealthCheck".to_string(),
            topo_identifier: ident.to_string(),
            value,
            message: String::new(),
        };
        graph.set_health(state("urn:1", HealthValue::Clear));
        graph.set_health(state("urn:2", HealthValue::Critical));
        assert_eq!(graph.health_states().count(), 1);
        let stored = graph.health_state("web_static_states").unwrap();
        assert_eq!(stored.topo_identifier, "urn:2");
        assert_eq!(stored.value, HealthValue::Critical);
    }
}
