//! Writes the purchase management OpenAPI document to disk so client
//! generators and reviewers can work from a checked-in copy.
//!
//! ```text
//! cargo run --bin openapi-export -- --output openapi/purchase-management-api.v1.json
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::Parser;
use purchase_management_api::openapi::ApiDocV1;
use utoipa::OpenApi;

#[derive(Parser)]
#[command(name = "openapi-export", about = "Export the OpenAPI document as JSON")]
struct Cli {
    /// Destination file; parent directories are created as needed
    #[arg(long, default_value = "openapi/purchase-management-api.v1.json")]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let paths = export(&cli.output)?;
    println!("Wrote {} paths to {}", paths, cli.output.display());
    Ok(())
}

/// Writes the document to `output` and returns how many paths it holds.
fn export(output: &Path) -> anyhow::Result<usize> {
    let document = ApiDocV1::openapi();
    let json = serde_json::to_string_pretty(&document).context("serializing OpenAPI document")?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(output, json).with_context(|| format!("writing {}", output.display()))?;

    Ok(document.paths.paths.len())
}
