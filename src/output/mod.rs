use std::path::Path;

use crate::analysis::AnalysisResult;
use crate::cli::OutputFormat;
use crate::Result;

pub mod formatters;

pub use formatters::*;

fn render(result: &AnalysisResult, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(format_as_text(result)),
        OutputFormat::Json => format_as_json(result),
    }
}

/// Save analysis result to file
pub async fn save_to_file(result: &AnalysisResult, path: &Path, format: &OutputFormat) -> Result<()> {
    let content = render(result, format)?;
    fs_err::write(path, content)?;
    Ok(())
}

/// Print analysis result to console
pub fn print_to_console(result: &AnalysisResult, format: &OutputFormat) -> Result<()> {
    let content = render(result, format)?;
    println!("{}", content);
    Ok(())
}
