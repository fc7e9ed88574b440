//! Embedded expression language for fenced code blocks
//!
//! A code block is evaluated with exactly four bindings in scope: the graph
//! built so far (read-only), the component or event under construction, and
//! the repeat index. The language has no way to reach the filesystem, the
//! network, processes or the clock.

pub mod ast;
mod eval;
mod grammar;
mod lexer;

use crate::error::SemanticError;
use crate::graph::{Component, Event, TopologyGraph};
use crate::value::Value;

pub use eval::EvalError;
pub use grammar::parse;

/// Bindings visible to an expression
pub struct Scope<'a> {
    pub graph: &'a TopologyGraph,
    pub component: Option<&'a mut Component>,
    pub event: Option<&'a mut Event>,
    pub repeat_index: i64,
}

impl<'a> Scope<'a> {
    /// Graph only; `component` and `event` evaluate to null
    pub fn new(graph: &'a TopologyGraph) -> Self {
        Self {
            graph,
            component: None,
            event: None,
            repeat_index: 0,
        }
    }

    pub fn for_component(
        graph: &'a TopologyGraph,
        component: &'a mut Component,
        repeat_index: i64,
    ) -> Self {
        Self {
            component: Some(component),
            repeat_index,
            ..Self::new(graph)
        }
    }

    pub fn for_event(graph: &'a TopologyGraph, event: &'a mut Event) -> Self {
        Self {
            event: Some(event),
            ..Self::new(graph)
        }
    }
}

/// What is being evaluated, for error messages
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub property: &'a str,
    pub element: &'a str,
}

/// Evaluate a code block body. Syntax and runtime failures are folded into a
/// single [`SemanticError::Evaluation`].
pub fn evaluate(
    code: &str,
    scope: &mut Scope<'_>,
    context: &EvalContext<'_>,
) -> Result<Value, SemanticError> {
    let expression = normalize_indentation(code);

    let outcome = match parse(&expression) {
        Ok(block) => eval::Evaluator::new(scope)
            .run(&block)
            .map_err(|e| vec![e.to_string()]),
        Err(errors) => Err(errors
            .iter()
            .map(|e| {
                let (line, column) = e.location(&expression);
                format!("{}:{}: {}", line, column, e.message())
            })
            .collect()),
    };

    outcome.map_err(|errors| SemanticError::Evaluation {
        property: context.property.to_string(),
        element: context.element.to_string(),
        expression,
        errors,
    })
}

/// Trim the block and remove the second line's indentation width from every
/// following line, keeping relative indentation.
pub fn normalize_indentation(code: &str) -> String {
    let code = code.trim();
    let code = code.strip_suffix("```").unwrap_or(code);

    let mut lines = code.split('\n');
    let first = lines.next().unwrap_or_default();
    let rest: Vec<&str> = lines.collect();
    let padding = rest
        .first()
        .map(|line| line.len() - line.trim_start_matches(' ').len())
        .unwrap_or(0);

    let mut out = first.to_string();
    for line in rest {
        let leading = line.len() - line.trim_start_matches(' ').len();
        out.push('\n');
        out.push_str(&line[leading.min(padding)..]);
    }
    out
}
