//! Where trees come from: single tree sources and tree sets

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::application::{ApplicationError, ApplicationResult};
use crate::infrastructure::document::DocumentFormat;

/// A single tree: a document file or one row of a tree database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeSource {
    Document(PathBuf),
    Database { path: PathBuf, id: i64 },
}

impl TreeSource {
    /// Parse `<path>` or `<db-path>#<id>`.
    ///
    /// Text after the last `#` that is not an integer stays part of a document
    /// path. A bare `#<id>` refers to the configured default database.
    pub fn parse(raw: &str, default_db: Option<&Path>) -> ApplicationResult<Self> {
        if raw.is_empty() {
            return Err(ApplicationError::invalid_source(raw, "empty"));
        }
        let database = raw
            .rsplit_once('#')
            .and_then(|(db, id)| id.parse::<i64>().ok().map(|id| (db, id)));
        match database {
            Some((db, id)) => {
                let path = if db.is_empty() {
                    default_db.map(Path::to_path_buf).ok_or_else(|| {
                        ApplicationError::invalid_source(raw, "no database given or configured")
                    })?
                } else {
                    PathBuf::from(db)
                };
                Ok(Self::Database { path, id })
            }
            None => {
                let path = PathBuf::from(raw);
                if DocumentFormat::from_path(&path).is_none() {
                    return Err(ApplicationError::invalid_source(
                        raw,
                        "expected a .toml or .json document, or <db>#<id>",
                    ));
                }
                Ok(Self::Document(path))
            }
        }
    }
}

impl FromStr for TreeSource {
    type Err = ApplicationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, None)
    }
}

impl fmt::Display for TreeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeSource::Document(path) => write!(f, "{}", path.display()),
            TreeSource::Database { path, id } => write!(f, "{}#{}", path.display(), id),
        }
    }
}

/// A collection of trees: a directory of documents or a whole database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeSet {
    Directory(PathBuf),
    Database(PathBuf),
}

impl TreeSet {
    /// Directories are document sets; any existing file is taken as a database.
    pub fn from_path(path: &Path) -> ApplicationResult<Self> {
        let raw = path.display().to_string();
        if path.is_dir() {
            Ok(Self::Directory(path.to_path_buf()))
        } else if path.is_file() {
            if DocumentFormat::from_path(path).is_some() {
                return Err(ApplicationError::invalid_source(
                    &raw,
                    "a tree set is a directory or a database, not a single document",
                ));
            }
            Ok(Self::Database(path.to_path_buf()))
        } else {
            Err(ApplicationError::invalid_source(&raw, "no such file or directory"))
        }
    }
}

impl fmt::Display for TreeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeSet::Directory(path) | TreeSet::Database(path) => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case("p.toml", TreeSource::Document(PathBuf::from("p.toml")))]
    #[case("trees/q.json", TreeSource::Document(PathBuf::from("trees/q.json")))]
    #[case("trees.db#3", TreeSource::Database { path: PathBuf::from("trees.db"), id: 3 })]
    #[case("runs/case#1.toml", TreeSource::Document(PathBuf::from("runs/case#1.toml")))]
    #[case("runs#2/trees.db#7", TreeSource::Database { path: PathBuf::from("runs#2/trees.db"), id: 7 })]
    fn given_text_when_parsing_then_source(#[case] raw: &str, #[case] expected: TreeSource) {
        assert_eq!(raw.parse::<TreeSource>().unwrap(), expected);
        assert_eq!(expected.to_string(), raw);
    }

    #[rstest]
    #[case("")]
    #[case("trees.db#x")]
    #[case("tree.yaml")]
    #[case("#4")]
    fn given_bad_text_when_parsing_then_invalid_source(#[case] raw: &str) {
        assert!(matches!(
            TreeSource::parse(raw, None),
            Err(ApplicationError::InvalidSource { .. })
        ));
    }

    #[test]
    fn given_bare_id_with_default_db_when_parsing_then_uses_default() {
        let source = TreeSource::parse("#4", Some(Path::new("/data/t.db"))).unwrap();
        assert_eq!(
            source,
            TreeSource::Database {
                path: PathBuf::from("/data/t.db"),
                id: 4
            }
        );
    }

    #[test]
    fn given_paths_when_classifying_sets_then_directory_or_database() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("trees.db");
        std::fs::write(&db, "").unwrap();
        let doc = dir.path().join("p.toml");
        std::fs::write(&doc, "").unwrap();

        assert_eq!(
            TreeSet::from_path(dir.path()).unwrap(),
            TreeSet::Directory(dir.path().to_path_buf())
        );
        assert_eq!(TreeSet::from_path(&db).unwrap(), TreeSet::Database(db));
        assert!(TreeSet::from_path(&doc).is_err());
        assert!(TreeSet::from_path(&dir.path().join("missing")).is_err());
    }
}
