// Snapshot export to JSON files

use crate::models::{CaptureMetadata, Snapshot};
use crate::utils::{whitespace_run, ResultExt};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn slug_invalid_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9\-_]").unwrap())
}

/// Lowercase, whitespace runs to '-', anything outside `[a-z0-9-_]` dropped
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();
    let dashed = whitespace_run().replace_all(&lowered, "-");
    slug_invalid_regex().replace_all(&dashed, "").into_owned()
}

/// `<prefix>-<source-slug>-<capturedAt with ':' and '.' as '-'>.json`
pub fn build_filename(prefix: &str, metadata: &CaptureMetadata) -> String {
    let slug = match slugify(&metadata.source_name) {
        s if s.is_empty() => "conversation".to_string(),
        s => s,
    };
    let stamp = crate::models::iso_millis::format(&metadata.captured_at).replace([':', '.'], "-");
    format!("{}-{}-{}.json", prefix, slug, stamp)
}

/// Write `snapshot` as pretty JSON into `dir`, returning the file path
pub fn write_snapshot(dir: &Path, prefix: &str, snapshot: &Snapshot) -> Result<PathBuf, String> {
    fs::create_dir_all(dir).with_context(&format!("Failed to create {}", dir.display()))?;

    let path = dir.join(build_filename(prefix, &snapshot.metadata));
    let json = serde_json::to_string_pretty(snapshot).with_context("Failed to serialize snapshot")?;
    fs::write(&path, json).with_context(&format!("Failed to write {}", path.display()))?;

    log::info!(
        "[Export] Wrote {} records to {}",
        snapshot.metadata.total_records,
        path.display()
    );
    Ok(path)
}
