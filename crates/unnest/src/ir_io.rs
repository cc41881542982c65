//! Reading and writing IR modules as JSON

use std::fs;
use std::path::{Path, PathBuf};
use unnest_diagnostics::{Diagnostic, DiagnosticCode, Location};
use unnest_ir::Module;
use walkdir::WalkDir;

/// Load a module, reporting any failure as a load diagnostic
pub fn read_module(path: &Path) -> Result<Module, Diagnostic> {
    let location = Location::file(path.display().to_string());
    let text = fs::read_to_string(path).map_err(|e| {
        Diagnostic::new(DiagnosticCode::InvalidIr, format!("cannot read IR module: {}", e))
            .with_location(location.clone())
            .build()
    })?;
    serde_json::from_str(&text).map_err(|e| {
        Diagnostic::new(DiagnosticCode::InvalidIr, format!("invalid IR module: {}", e))
            .with_location(Location::new(location.file, e.line() as u32))
            .with_help("IR modules are JSON documents with `name` and `defns` fields")
            .build()
    })
}

pub fn module_to_json(module: &Module) -> serde_json::Result<String> {
    let mut json = serde_json::to_string_pretty(module)?;
    json.push('\n');
    Ok(json)
}

/// Collect all JSON files under `path`, or `path` itself if it is a file
pub fn collect_ir_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && p.extension().map_or(false, |ext| ext == "json"))
        .collect();
    files.sort();
    files
}
