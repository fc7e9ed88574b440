//! Parser for the topology DSL
//!
//! Source text is tokenized with logos and parsed with chumsky into a
//! [`TopologyModel`]. No semantic checks happen here.

pub mod ast;
mod grammar;
pub mod lexer;

pub use ast::*;
pub use grammar::parse;
