use std::ops::Range;
use std::path::PathBuf;

use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};
use thiserror::Error;

use crate::graph::GraphViolation;
use crate::program::Violation;

/// Failure to turn serialized data into a valid program or graph.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("syntax error: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("malformed program: {}", join(.0))]
    MalformedProgram(Vec<Violation>),

    #[error("malformed graph: {}", join(.0))]
    MalformedGraph(Vec<GraphViolation>),
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl LoadError {
    /// Convert to codespan-reporting diagnostics against the loaded text.
    pub fn to_diagnostics(&self, file_id: usize, source: &str) -> Vec<Diagnostic<usize>> {
        match self {
            LoadError::Io { .. } => vec![Diagnostic::new(Severity::Error).with_message(self.to_string())],
            LoadError::Syntax(err) => {
                let offset = line_column_to_offset(source, err.line(), err.column());
                vec![
                    Diagnostic::new(Severity::Error)
                        .with_message(format!("syntax error: {}", err))
                        .with_labels(vec![Label::primary(file_id, point(source, offset))]),
                ]
            }
            LoadError::MalformedProgram(violations) => violations
                .iter()
                .map(|v| {
                    let diagnostic = Diagnostic::new(Severity::Error).with_message(v.to_string());
                    match v.block_id().and_then(|id| locate_key(source, id.as_str())) {
                        Some(span) => diagnostic.with_labels(vec![
                            Label::primary(file_id, span).with_message("block defined here"),
                        ]),
                        None => diagnostic,
                    }
                })
                .collect(),
            LoadError::MalformedGraph(violations) => violations
                .iter()
                .map(|v| {
                    let diagnostic = Diagnostic::new(Severity::Error).with_message(v.to_string());
                    match locate_value(source, v.element_id()) {
                        Some(span) => diagnostic.with_labels(vec![Label::primary(file_id, span)]),
                        None => diagnostic,
                    }
                })
                .collect(),
        }
    }
}

/// serde_json reports 1-based lines and columns; line 0 means "no position".
fn line_column_to_offset(source: &str, line: usize, column: usize) -> usize {
    if line == 0 {
        return 0;
    }
    let line_start: usize = source
        .split_inclusive('\n')
        .take(line - 1)
        .map(str::len)
        .sum();
    (line_start + column.saturating_sub(1)).min(source.len())
}

fn point(source: &str, offset: usize) -> Range<usize> {
    if offset < source.len() {
        offset..offset + 1
    } else {
        offset..offset
    }
}

/// Span of the first `"name"` occurrence that is used as an object key.
pub fn locate_key(source: &str, name: &str) -> Option<Range<usize>> {
    let quoted = format!("\"{}\"", name);
    source.match_indices(&quoted).map(|(start, _)| start).find_map(|start| {
        let end = start + quoted.len();
        source[end..]
            .trim_start()
            .starts_with(':')
            .then_some(start..end)
    })
}

/// Span of the first `"name"` occurrence used as a value.
pub fn locate_value(source: &str, name: &str) -> Option<Range<usize>> {
    let quoted = format!("\"{}\"", name);
    source.match_indices(&quoted).map(|(start, _)| start).find_map(|start| {
        let end = start + quoted.len();
        (!source[end..].trim_start().starts_with(':')).then_some(start..end)
    })
}
