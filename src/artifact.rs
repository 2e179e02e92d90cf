//! Reading and writing pipeline artifacts on disk.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::PipelineError;
use crate::model::ArtifactManifest;

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(sha256_hex(&bytes))
}

/// Fail with `MissingInput` naming the command that produces `path`.
pub fn require(path: &Path, stage: &'static str) -> Result<(), PipelineError> {
    if path.exists() {
        Ok(())
    } else {
        Err(PipelineError::MissingInput {
            path: path.to_path_buf(),
            stage,
        })
    }
}

/// Load a JSON artifact produced by an earlier `stage`.
pub fn read_json<T: DeserializeOwned>(path: &Path, stage: &'static str) -> Result<T> {
    require(path, stage)?;
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Write pretty JSON, replacing the whole file. The content lands in a
/// sibling temp file first so a failed run never leaves a half-written artifact.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<Vec<u8>> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_bytes(path, &bytes)?;
    Ok(bytes)
}

pub fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

/// `foo.json` -> `foo.manifest.json`
pub fn manifest_path(path: &Path) -> std::path::PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{stem}.manifest.json"))
}

/// Manifest skeleton for bytes just written to `path`.
pub fn manifest_for(path: &Path, bytes: &[u8]) -> ArtifactManifest {
    ArtifactManifest {
        file: display_path(path),
        sha256: sha256_hex(bytes),
        bytes: bytes.len() as u64,
        ..Default::default()
    }
}

/// Forward-slash path for manifests, regardless of platform.
pub fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    if !src.exists() {
        anyhow::bail!("Missing source file: {}", src.display());
    }
    let bytes = fs::read(src).with_context(|| format!("Failed to read {}", src.display()))?;
    write_bytes(dst, &bytes)
}
