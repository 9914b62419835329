//! JSON wire format for programs and graphs.
//!
//! Decoding validates: a program or graph that comes out of this module
//! satisfies every structural invariant.

pub mod error;

use std::path::Path;

pub use error::{LoadError, locate_key, locate_value};

use crate::graph::Graph;
use crate::program::Program;

/// Parse and validate a program.
pub fn decode(source: &str) -> Result<Program, LoadError> {
    let program: Program = serde_json::from_str(source)?;
    program.validate().map_err(LoadError::MalformedProgram)?;
    tracing::debug!(blocks = program.len(), heads = program.heads.len(), "decoded program");
    Ok(program)
}

/// Pretty-printed JSON. Absent optionals are omitted.
pub fn encode(program: &Program) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(program)
}

pub fn load_program(path: &Path) -> Result<Program, LoadError> {
    decode(&read(path)?)
}

/// Parse and validate a dataflow graph.
pub fn decode_graph(source: &str) -> Result<Graph, LoadError> {
    let graph: Graph = serde_json::from_str(source)?;
    graph.validate().map_err(LoadError::MalformedGraph)?;
    tracing::debug!(nodes = graph.nodes.len(), links = graph.links.len(), "decoded graph");
    Ok(graph)
}

pub fn encode_graph(graph: &Graph) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(graph)
}

pub fn load_graph(path: &Path) -> Result<Graph, LoadError> {
    decode_graph(&read(path)?)
}

fn read(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}
