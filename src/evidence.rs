//! Evidence package listing.
//!
//! A display step: the listed names come straight from config. Existence is
//! noted for the operator but never affects the outcome.
use crate::config::resolve_path;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvidenceEntry {
    pub name: String,
    pub exists: bool,
}

pub fn enumerate(root: &Path, files: &[String]) -> Vec<EvidenceEntry> {
    files
        .iter()
        .map(|name| EvidenceEntry {
            name: name.clone(),
            exists: resolve_path(root, name).exists(),
        })
        .collect()
}
