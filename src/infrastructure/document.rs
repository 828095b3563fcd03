//! Tree documents on disk (TOML or JSON outlines)

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};

use crate::domain::TreeOutline;
use crate::infrastructure::error::{InfraError, InfraResult};

/// Serialization format of a tree document, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Toml,
    Json,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Toml => "toml",
            Self::Json => "json",
        }
    }
}

/// Parse document text in the given format.
pub fn parse_outline(content: &str, format: DocumentFormat, path: &Path) -> InfraResult<TreeOutline> {
    let parse_err = |message: String| InfraError::Parse {
        path: path.to_path_buf(),
        message,
    };
    match format {
        DocumentFormat::Toml => toml::from_str(content).map_err(|e| parse_err(e.to_string())),
        DocumentFormat::Json => serde_json::from_str(content).map_err(|e| parse_err(e.to_string())),
    }
}

/// Render an outline as document text.
pub fn render_outline(outline: &TreeOutline, format: DocumentFormat) -> InfraResult<String> {
    let rendered = match format {
        DocumentFormat::Toml => toml::to_string_pretty(outline).map_err(|e| e.to_string()),
        DocumentFormat::Json => serde_json::to_string_pretty(outline).map_err(|e| e.to_string()),
    };
    rendered.map_err(|message| InfraError::Parse {
        path: PathBuf::from(format!("<{}>", format.extension())),
        message,
    })
}

/// Read a tree document, detecting the format from the extension.
#[instrument(level = "debug")]
pub fn read_outline(path: &Path) -> InfraResult<TreeOutline> {
    let format =
        DocumentFormat::from_path(path).ok_or_else(|| InfraError::UnsupportedFormat(path.to_path_buf()))?;
    let content = fs::read_to_string(path)
        .map_err(|e| InfraError::io(format!("read {}", path.display()), e))?;
    parse_outline(&content, format, path)
}

/// Write a tree document, detecting the format from the extension.
#[instrument(level = "debug", skip(outline))]
pub fn write_outline(outline: &TreeOutline, path: &Path) -> InfraResult<()> {
    let format =
        DocumentFormat::from_path(path).ok_or_else(|| InfraError::UnsupportedFormat(path.to_path_buf()))?;
    let content = render_outline(outline, format)?;
    fs::write(path, content).map_err(|e| InfraError::io(format!("write {}", path.display()), e))
}

/// All tree documents below `dir`, sorted by path.
#[instrument(level = "debug")]
pub fn find_documents(dir: &Path) -> InfraResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(InfraError::io(
            format!("scan {}", dir.display()),
            std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        ));
    }
    let mut documents: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry in tree set");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| DocumentFormat::from_path(p).is_some())
        .collect();
    documents.sort();
    debug!(count = documents.len(), "found tree documents");
    Ok(documents)
}
