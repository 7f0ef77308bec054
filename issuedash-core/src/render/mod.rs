//! Renderers for evaluated dashboards.

mod html;
mod markdown;

use std::io::Write;

use crate::analytics::Analytics;
use crate::config::Output;
use crate::error::{Error, Result};

pub use html::render as render_html;
pub use markdown::render as render_markdown;

/// Render an evaluated dashboard in the configured format.
pub fn render(analytics: &Analytics, output: &Output) -> Result<String> {
    match output.format.as_str() {
        "markdown" => markdown::render(analytics),
        "html" => html::render(analytics),
        other => Err(Error::Config(format!(
            "config: unknown output format '{other}'"
        ))),
    }
}

/// Render and write to the configured file, or standard output when no
/// filename is set.
pub fn write(analytics: &Analytics, output: &Output) -> Result<()> {
    let rendered = render(analytics, output)?;
    match &output.filename {
        Some(filename) => {
            tracing::info!(filename = %filename, format = %output.format, "writing dashboard");
            std::fs::write(filename, rendered)?;
        }
        None => {
            std::io::stdout().write_all(rendered.as_bytes())?;
        }
    }
    Ok(())
}
