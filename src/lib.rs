//! Topo DSL - interpreter for a declarative infrastructure topology language
//!
//! Source files describe components, the relations between them, static
//! health states and change events. This library parses them, resolves
//! properties against a `defaults` layer, evaluates embedded code blocks in a
//! small sandboxed expression language and builds a [`TopologyGraph`] whose
//! relations are resolved in a dedicated second pass.
//!
//! # Example
//!
//! ```rust
//! use topo_dsl::{parse_and_interpret, TopologyGraph};
//!
//! let mut graph = TopologyGraph::new();
//! parse_and_interpret(
//!     r#"components {
//!         Host(name "web1" id "urn:host:web1" relations ["urn:host:db1|uses"])
//!         Host(name "db1" id "urn:host:db1")
//!     }"#,
//!     "inline",
//!     &mut graph,
//! )
//! .unwrap();
//! assert!(graph.relation("urn:host:web1 --> urn:host:db1").is_some());
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod interpreter;
pub mod loader;
pub mod parser;
pub mod sandbox;
pub mod value;

use std::path::PathBuf;

use thiserror::Error;

pub use config::{ConfigError, TopologyConfig};
pub use error::{ParseError, SemanticError};
pub use graph::{TopologyGraph, TopologySnapshot};
pub use interpreter::{Interpreter, UnitSummary};
pub use loader::{collect_source_files, load_sources, parse_and_interpret};
pub use parser::{parse, TopologyModel};
pub use value::{Value, ValueMap};

/// Errors that abort a run
#[derive(Debug, Error)]
pub enum TopologyError {
    /// Source text does not follow the grammar
    #[error("{}", format_syntax_errors(file, text, errors))]
    Syntax {
        file: String,
        text: String,
        errors: Vec<ParseError>,
    },

    #[error(transparent)]
    Semantic(#[from] SemanticError),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl TopologyError {
    /// Human-oriented rendering; syntax errors get an ariadne report with source context
    pub fn report(&self) -> String {
        match self {
            TopologyError::Syntax { file, text, errors } => errors
                .iter()
                .map(|e| e.format(text, file))
                .collect::<Vec<_>>()
                .join("\n"),
            other => other.to_string(),
        }
    }
}

fn format_syntax_errors(file: &str, text: &str, errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|e| {
            let (line, column) = e.location(text);
            format!("{}:{}:{}: {}", file, line, column, e.message())
        })
        .collect::<Vec<_>>()
        .join("; ")
}
