//! Turns a parsed [`TopologyModel`] into graph content
//!
//! One source unit is interpreted in three steps: every component definition
//! in source order, then the relation pass, then the events. The graph is
//! shared with earlier units of the same run.

pub mod component;
pub mod event;
pub mod health;
pub mod properties;

use crate::error::SemanticError;
use crate::graph::{resolver, TopologyGraph};
use crate::parser::TopologyModel;

pub use properties::PropertyResolver;

/// Counts for one interpreted unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitSummary {
    pub components: usize,
    pub relations: usize,
    pub events: usize,
}

pub struct Interpreter<'g> {
    graph: &'g mut TopologyGraph,
}

impl<'g> Interpreter<'g> {
    pub fn new(graph: &'g mut TopologyGraph) -> Self {
        Self { graph }
    }

    /// Interpret one unit. The first error aborts.
    pub fn interpret(&mut self, model: &TopologyModel) -> Result<UnitSummary, SemanticError> {
        let defaults = model.defaults.as_ref().map(|d| &d.node);
        let mut summary = UnitSummary::default();

        for decl in &model.components {
            summary.components += component::interpret_component(self.graph, &decl.node, defaults)?;
        }

        summary.relations = resolver::resolve_relations(self.graph)?;

        for decl in &model.events {
            event::interpret_event(self.graph, &decl.node, defaults)?;
            summary.events += 1;
        }

        Ok(summary)
    }
}
