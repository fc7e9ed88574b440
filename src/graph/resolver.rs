//! Relation and identifier resolution
//!
//! Runs after every component of a source unit is registered. Each textual
//! reference is looked up in tiers:
//!
//! 1. exact uid match
//! 2. unique name match (a name shared by several components is an error)
//! 3. not found: fatal for relations, kept verbatim for event identifiers
//!
//! Matching is exact and case-sensitive.

use crate::error::SemanticError;

use super::TopologyGraph;

/// Resolve a reference to a component uid, `None` when nothing matches
pub fn resolve_reference(
    graph: &TopologyGraph,
    reference: &str,
) -> Result<Option<String>, SemanticError> {
    if graph.component_exists(reference) {
        return Ok(Some(reference.to_string()));
    }
    Ok(graph
        .component_by_name(reference)?
        .map(|component| component.uid.clone()))
}

/// Drain every component's pending relations into graph edges.
///
/// Returns the number of edges added.
pub fn resolve_relations(graph: &mut TopologyGraph) -> Result<usize, SemanticError> {
    let pending: Vec<_> = graph
        .components_mut()
        .flat_map(|c| std::mem::take(&mut c.pending_relations))
        .collect();

    let mut added = 0;
    for relation in pending {
        let target = resolve_reference(graph, &relation.target)?.ok_or_else(|| {
            SemanticError::UnresolvedRelation {
                target: relation.target.clone(),
                component: relation.declared_by.clone(),
            }
        })?;

        let (source_id, target_id) = if relation.reverse {
            (target, relation.declared_by.clone())
        } else {
            (relation.declared_by.clone(), target)
        };

        let edge = graph.add_relation(&source_id, &target_id, &relation.relation_type)?;
        tracing::debug!(
            external_id = %edge.external_id,
            declared = %relation.external_id,
            relation_type = %edge.relation_type,
            "resolved relation"
        );
        added += 1;
    }
    Ok(added)
}

/// Resolve event identifiers. Unknown identifiers are kept as written since
/// they may refer to components that only exist on the receiving side.
pub fn resolve_identifiers(
    graph: &TopologyGraph,
    identifiers: &[String],
) -> Result<Vec<String>, SemanticError> {
    identifiers
        .iter()
        .map(|identifier| {
            Ok(match resolve_reference(graph, identifier)? {
                Some(uid) => uid,
                None => {
                    tracing::debug!(%identifier, "identifier not in graph, kept verbatim");
                    identifier.clone()
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Component, PendingRelation};
    use pretty_assertions::assert_eq;

    fn component(uid: &str, name: &str, relations: &[&str]) -> Component {
        let mut c = Component::new("Host");
        c.uid = uid.to_string();
        c.name = name.to_string();
        c.pending_relations = relations
            .iter()
            .map(|r| PendingRelation::parse(uid, r))
            .collect();
        c
    }

    fn edges(graph: &TopologyGraph) -> Vec<(String, String, String)> {
        let mut edges: Vec<_> = graph
            .relations()
            .map(|r| (r.source_id.clone(), r.target_id.clone(), r.relation_type.clone()))
            .collect();
        edges.sort();
        edges
    }

    #[test]
    fn test_resolve_by_uid_and_by_name() {
        let mut graph = TopologyGraph::new();
        graph
            .add_component(component("urn:web", "web", &["urn:db", "cache|reads"]))
            .unwrap();
        graph.add_component(component("urn:db", "db", &[])).unwrap();
        graph.add_component(component("urn:cache", "cache", &[])).unwrap();

        assert_eq!(resolve_relations(&mut graph).unwrap(), 2);
        assert_eq!(
            edges(&graph),
            vec![
                ("urn:web".into(), "urn:cache".into(), "reads".into()),
                ("urn:web".into(), "urn:db".into(), "uses".into()),
            ]
        );
        assert!(!graph.has_pending_relations());
    }

    #[test]
    fn test_reverse_marker_flips_direction() {
        let mut graph = TopologyGraph::new();
        graph.add_component(component("A", "a", &["<B|calls"])).unwrap();
        graph.add_component(component("B", "b", &[])).unwrap();

        resolve_relations(&mut graph).unwrap();
        assert_eq!(edges(&graph), vec![("B".into(), "A".into(), "calls".into())]);
        assert!(graph.relation("B --> A").is_some());
    }

    #[test]
    fn test_unresolved_target_fails() {
        let mut graph = TopologyGraph::new();
        graph.add_component(component("urn:web", "web", &["nowhere"])).unwrap();

        let err = resolve_relations(&mut graph).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("nowhere"));
        assert!(text.contains("urn:web"));
    }

    #[test]
    fn test_ambiguous_name_fails() {
        let mut graph = TopologyGraph::new();
        graph.add_component(component("urn:web", "web", &["db"])).unwrap();
        graph.add_component(component("urn:db1", "db", &[])).unwrap();
        graph.add_component(component("urn:db2", "db", &[])).unwrap();

        assert!(matches!(
            resolve_relations(&mut graph),
            Err(SemanticError::AmbiguousName { .. })
        ));
    }

    #[test]
    fn test_uid_match_wins_over_name() {
        let mut graph = TopologyGraph::new();
        graph.add_component(component("x", "first", &[])).unwrap();
        graph.add_component(component("urn:y", "x", &[])).unwrap();
        graph.add_component(component("urn:z", "z", &["x"])).unwrap();

        resolve_relations(&mut graph).unwrap();
        assert_eq!(edges(&graph), vec![("urn:z".into(), "x".into(), "uses".into())]);
    }

    #[test]
    fn test_duplicate_edge_fails() {
        let mut graph = TopologyGraph::new();
        graph
            .add_component(component("urn:a", "a", &["urn:b", "b|calls"]))
            .unwrap();
        graph.add_component(component("urn:b", "b", &[])).unwrap();

        assert!(matches!(
            resolve_relations(&mut graph),
            Err(SemanticError::DuplicateRelation { .. })
        ));
    }

    #[test]
    fn test_identifiers_keep_unknown_entries() {
        let mut graph = TopologyGraph::new();
        graph.add_component(component("urn:web", "web", &[])).unwrap();

        let resolved = resolve_identifiers(
            &graph,
            &["web".to_string(), "urn:web".to_string(), "remote-only".to_string()],
        )
        .unwrap();
        assert_eq!(resolved, vec!["urn:web", "urn:web", "remote-only"]);
    }
}
