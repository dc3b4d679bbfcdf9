//! File download command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use console::style;

use courier_types::error::ClientError;

use crate::client::RemoteClient;

/// Download `filename` to `output`, or to `<prefix><base name>` in the
/// working directory.
///
/// A transfer that fails part-way removes the partial file and leaves any
/// existing file at the destination alone.
pub async fn download(
    client: &RemoteClient,
    filename: &str,
    output: Option<PathBuf>,
    prefix: &str,
    json: bool,
) -> Result<()> {
    let dest = output.unwrap_or_else(|| default_destination(filename, prefix));

    let report = match client.download_to(filename, &dest).await {
        Ok(report) => report,
        Err(ClientError::PartialTransfer {
            bytes_written,
            partial,
            source,
        }) => {
            discard_partial(&partial).await;
            anyhow::bail!("download of '{filename}' failed after {bytes_written} bytes: {source}");
        }
        Err(e) => return Err(e).with_context(|| format!("download of '{filename}' failed")),
    };

    if json {
        println!(
            "{}",
            serde_json::json!({
                "filename": filename,
                "dest": dest.display().to_string(),
                "bytes": report.bytes,
                "chunks": report.chunks,
            })
        );
    } else {
        println!(
            "  {} Downloaded {} to {} ({} bytes)",
            style("✓").green().bold(),
            style(filename).cyan(),
            style(dest.display()).bold(),
            report.bytes
        );
    }
    Ok(())
}

/// Remove what an interrupted download left behind.
async fn discard_partial(partial: &Path) {
    match tokio::fs::remove_file(partial).await {
        Ok(()) => tracing::debug!(partial = %partial.display(), "removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(partial = %partial.display(), error = %e, "could not remove partial download");
        }
    }
}

/// `<prefix><base name>`, relative to the working directory.
pub fn default_destination(filename: &str, prefix: &str) -> PathBuf {
    let base = Path::new(filename)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.replace(['/', '\\', '.'], "_"));
    PathBuf::from(format!("{prefix}{base}"))
}
