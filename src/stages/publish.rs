use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;

use crate::artifact::{
    copy_file, display_path, manifest_for, manifest_path, read_json, require, sha256_file, write_json,
};
use crate::config::Settings;
use crate::model::{FrontendIndex, OverlayDataset};
use crate::project::build_index;

pub fn build_frontend_index(settings: &Settings) -> Result<FrontendIndex> {
    let overlay_path = settings.paths.overlay();
    let overlay: OverlayDataset = read_json(&overlay_path, "overlay")?;

    let generated_utc = Utc::now().to_rfc3339();
    let index = build_index(&overlay, &display_path(&overlay_path), &generated_utc)?;

    let out = settings.paths.index();
    let bytes = write_json(&out, &index)?;
    let mut manifest = manifest_for(&out, &bytes);
    manifest.generated_utc = Some(generated_utc);
    manifest.record_count = Some(index.meta.record_count);
    manifest.stem_true_count = Some(index.meta.stem_true_count);
    manifest.source_overlay_sha256 = Some(sha256_file(&overlay_path)?);
    let manifest_out = manifest_path(&out);
    write_json(&manifest_out, &manifest)?;

    println!("Wrote: {} ({} records)", display_path(&out), index.meta.record_count);
    println!("SHA256: {}", manifest.sha256);
    println!("Wrote: {}", display_path(&manifest_out));
    Ok(index)
}

/// Copy the frontend index and its manifest into the site's data directory.
pub fn publish(settings: &Settings) -> Result<Vec<PathBuf>> {
    let index = settings.paths.index();
    let files = [index.clone(), manifest_path(&index)];

    let mut published = Vec::with_capacity(files.len());
    for src in &files {
        require(src, "index")?;
        let Some(name) = src.file_name() else {
            continue;
        };
        let dst = settings.paths.publish_dir.join(name);
        copy_file(src, &dst)?;
        published.push(dst);
    }

    println!("Published site data to {}:", display_path(&settings.paths.publish_dir));
    for p in &published {
        println!(" - {}", display_path(p));
    }
    Ok(published)
}
