//! Input surface: source discovery and the per-unit pipeline

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::TopologyConfig;
use crate::graph::TopologyGraph;
use crate::interpreter::{Interpreter, UnitSummary};
use crate::parser::parse;
use crate::TopologyError;

/// Expand files and directories into the list of source files.
///
/// Directories are scanned non-recursively for regular files carrying
/// `extension`, sorted by file name. Files given explicitly are taken as-is.
pub fn collect_source_files(
    paths: &[PathBuf],
    extension: &str,
) -> Result<Vec<PathBuf>, TopologyError> {
    let mut files = Vec::new();
    for path in paths {
        let metadata = fs::metadata(path).map_err(|e| io_error(path, e))?;
        if !metadata.is_dir() {
            files.push(path.clone());
            continue;
        }

        let mut found = Vec::new();
        for entry in fs::read_dir(path).map_err(|e| io_error(path, e))? {
            let entry = entry.map_err(|e| io_error(path, e))?;
            let candidate = entry.path();
            let is_file = entry.file_type().map_err(|e| io_error(&candidate, e))?.is_file();
            if is_file && candidate.extension().is_some_and(|ext| ext == extension) {
                found.push(candidate);
            }
        }
        found.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        files.extend(found);
    }
    Ok(files)
}

/// Parse and interpret one in-memory unit into `graph`
pub fn parse_and_interpret(
    source: &str,
    name: &str,
    graph: &mut TopologyGraph,
) -> Result<UnitSummary, TopologyError> {
    let model = parse(source).map_err(|errors| TopologyError::Syntax {
        file: name.to_string(),
        text: source.to_string(),
        errors,
    })?;
    Ok(Interpreter::new(graph).interpret(&model)?)
}

/// Build one graph from every configured source, unit by unit
pub fn load_sources(config: &TopologyConfig) -> Result<TopologyGraph, TopologyError> {
    let files = collect_source_files(&config.sources, &config.extension)?;
    let mut graph = TopologyGraph::new();

    for file in &files {
        let source = fs::read_to_string(file).map_err(|e| io_error(file, e))?;
        let summary = parse_and_interpret(&source, &file.display().to_string(), &mut graph)?;
        tracing::info!(
            file = %file.display(),
            components = summary.components,
            relations = summary.relations,
            events = summary.events,
            "interpreted source"
        );
    }

    tracing::info!(
        files = files.len(),
        components = graph.component_count(),
        relations = graph.relation_count(),
        health_states = graph.health_states().count(),
        events = graph.events().len(),
        "topology loaded"
    );
    Ok(graph)
}

fn io_error(path: &Path, source: std::io::Error) -> TopologyError {
    TopologyError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_path_is_io_error() {
        let err = collect_source_files(&[PathBuf::from("/nonexistent/a.topo")], "topo").unwrap_err();
        assert!(matches!(err, TopologyError::Io { .. }));
    }

    #[test]
    fn test_syntax_error_carries_location() {
        let mut graph = TopologyGraph::new();
        let err = parse_and_interpret("components {\n  Host(name a\n}", "unit.topo", &mut graph)
            .unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("unit.topo:3:1:"), "{}", text);
    }
}
