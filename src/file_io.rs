//! Import/export of paintings as portable JSON documents.
//!
//! The document is `{ "name": string, "shapes": [...] }`, UTF-8 text.
//! Import is strict: every shape entry must deserialize, otherwise the
//! whole document is rejected and the canvas is left untouched.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::EaselError;
use crate::shapes::Shape;

/// Portable painting document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaintingFile {
    pub name: String,
    pub shapes: Vec<Shape>,
}

/// Serialize a painting to the portable document text.
pub fn export_painting(name: &str, shapes: &[Shape]) -> Result<String> {
    let doc = PaintingFile {
        name: name.to_string(),
        shapes: shapes.to_vec(),
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Parse a portable document. Anything other than a `{name, shapes}` top
/// level, or a malformed shape entry, is a validation error.
pub fn import_painting(text: &str) -> Result<PaintingFile, EaselError> {
    serde_json::from_str(text).map_err(|e| EaselError::Validation(e.to_string()))
}

/// Derive a download filename from the painting name: whitespace runs
/// become single underscores, `.json` is appended.
pub fn suggested_filename(name: &str) -> String {
    let mut stem = String::with_capacity(name.len());
    let mut in_whitespace = false;
    for ch in name.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                stem.push('_');
            }
            in_whitespace = true;
        } else {
            stem.push(ch);
            in_whitespace = false;
        }
    }
    if stem.is_empty() {
        stem.push_str("painting");
    }
    format!("{stem}.json")
}

/// Write an export document to disk.
pub fn save_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, contents).with_context(|| format!("Failed to save to {:?}", path))?;
    Ok(())
}

/// Read an import document from disk.
pub fn load_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read from {:?}", path))
}
