//! Diff command implementation.

use super::OutputFormat;
use recsync_protocol::{ids_to_download, IdRevisionMap, RecordId, RemoteIndex};
use std::path::Path;

/// Loads an `[{"_id", "_rev"}]` index file.
pub fn load_index(path: &Path) -> Result<IdRevisionMap, Box<dyn std::error::Error>> {
    let bytes =
        std::fs::read(path).map_err(|e| format!("Cannot read {}: {e}", path.display()))?;
    let map = RemoteIndex::decode(&bytes)
        .and_then(RemoteIndex::into_map)
        .map_err(|e| format!("Invalid index {}: {e}", path.display()))?;
    Ok(map)
}

/// Runs the diff command.
pub fn run(
    local_path: &Path,
    remote_path: &Path,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let local = load_index(local_path)?;
    let remote = load_index(remote_path)?;
    let ids = ids_to_download(&remote, &local);

    match format {
        OutputFormat::Json => {
            let ids: Vec<&str> = ids.iter().map(RecordId::as_str).collect();
            println!("{}", serde_json::to_string_pretty(&ids)?);
        }
        OutputFormat::Text => {
            println!(
                "{} of {} remote records to download",
                ids.len(),
                remote.len()
            );
            for id in &ids {
                let reason = if local.contains(id) { "changed" } else { "new" };
                println!("  {id} ({reason})");
            }
        }
    }

    Ok(())
}
