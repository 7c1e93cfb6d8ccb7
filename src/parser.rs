use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Parses Rust sources into `syn` syntax trees.
///
/// # Example
///
/// ```no_run
/// use openapi_from_source::parser::AstParser;
/// use std::path::Path;
///
/// let parsed = AstParser::parse_file(Path::new("src/main.rs")).unwrap();
/// println!("Parsed {} items", parsed.syntax_tree.items.len());
/// ```
pub struct AstParser;

/// A parsed source file.
#[derive(Debug)]
pub struct ParsedFile {
    pub path: PathBuf,
    pub syntax_tree: syn::File,
}

impl AstParser {
    /// Reads and parses one file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or is not valid Rust.
    pub fn parse_file(path: &Path) -> Result<ParsedFile> {
        debug!("Parsing file: {}", path.display());

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;

        Self::parse_source(path, &content)
    }

    /// Parses source text that is already in memory; `path` is only recorded.
    pub fn parse_source(path: &Path, content: &str) -> Result<ParsedFile> {
        let syntax_tree = syn::parse_file(content)
            .with_context(|| format!("Failed to parse Rust syntax in file: {}", path.display()))?;

        Ok(ParsedFile {
            path: path.to_path_buf(),
            syntax_tree,
        })
    }

    /// Parses every path, keeping the files that parse. A file with syntax
    /// errors is logged and left out; the rest of the project is still usable.
    pub fn parse_files(paths: &[PathBuf]) -> Vec<ParsedFile> {
        let parsed: Vec<ParsedFile> = paths
            .iter()
            .filter_map(|path| match Self::parse_file(path) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    warn!("Skipping {}: {:#}", path.display(), e);
                    None
                }
            })
            .collect();

        debug!("Parsed {} of {} files", parsed.len(), paths.len());
        parsed
    }
}

/// Module path of a source file relative to the project root.
///
/// A leading `src` directory is dropped, `mod.rs`, `lib.rs` and `main.rs`
/// name their directory's module: `src/routes/accounts.rs` is
/// `["routes", "accounts"]`, `src/routes/mod.rs` is `["routes"]` and
/// `src/lib.rs` is the crate root `[]`.
pub fn module_path(root: Option<&Path>, file: &Path) -> Vec<String> {
    let relative = root
        .and_then(|root| file.strip_prefix(root).ok())
        .unwrap_or(file);

    let mut segments: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if root.is_none() {
        // Without a root only the file itself says anything about the module.
        segments = segments.split_off(segments.len().saturating_sub(1));
    }

    if let Some(last) = segments.pop() {
        let stem = Path::new(&last)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or(last);
        if !matches!(stem.as_str(), "mod" | "lib" | "main") {
            segments.push(stem);
        }
    }

    if segments.first().map(String::as_str) == Some("src") {
        segments.remove(0);
    }

    segments
}
