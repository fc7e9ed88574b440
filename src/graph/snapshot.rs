//! Immutable view of a finished graph, as handed to a publisher

use serde::Serialize;

use super::{Component, Event, HealthState, Relation, TopologyGraph};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopologySnapshot {
    pub components: Vec<Component>,
    pub relations: Vec<Relation>,
    pub health: Vec<HealthState>,
    pub events: Vec<Event>,
}

impl TopologySnapshot {
    pub(super) fn from_graph(graph: &TopologyGraph) -> Self {
        let components = graph
            .components()
            .map(|c| {
                let mut c = c.clone();
                c.dedup_labels();
                c
            })
            .collect();

        Self {
            components,
            relations: graph.relations().cloned().collect(),
            health: graph.health_states().cloned().collect(),
            events: graph.events().to_vec(),
        }
    }

    /// One-line count summary
    pub fn summary(&self) -> String {
        format!(
            "{} components, {} relations, {} health states, {} events",
            self.components.len(),
            self.relations.len(),
            self.health.len(),
            self.events.len()
        )
    }
}
