mod ast;
mod combinators;

pub use ast::{ParsedCommand, Pipeline};

use combinators::{parse_pipeline_expr, parse_separator, Separator};

use crate::error::{Result, ShellError};

// ── Public API ────────────────────────────────────────────────────────────

/// Parse an entire input line into the pipelines it contains, in order.
///
/// Blank lines and comments yield an empty list. A pipeline followed by `&`
/// is marked as background; `;` and end-of-line leave it in the foreground.
pub fn parse_line(input: &str) -> Result<Vec<Pipeline>> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(Vec::new());
    }

    let mut pipelines = Vec::new();
    let mut rest = trimmed;

    while !rest.trim().is_empty() {
        let (after_pipeline, mut pipeline) =
            parse_pipeline_expr(rest).map_err(|_| ShellError::Syntax(rest.trim().to_string()))?;
        rest = after_pipeline;

        if !rest.trim().is_empty() {
            let (after_sep, sep) = parse_separator(rest)
                .map_err(|_| ShellError::Syntax(rest.trim().to_string()))?;
            pipeline.background = sep == Separator::Amp;
            rest = after_sep;
        }
        pipelines.push(pipeline);
    }

    Ok(pipelines)
}

// ── Tests ──────────────────────────────────────────────────────────────────
