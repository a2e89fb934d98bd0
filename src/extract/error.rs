//! Error types for format readers

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while reading an input file into a record set
#[derive(Error, Debug)]
pub enum ParseError {
    /// Input file does not exist
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Input file exists but cannot be opened
    #[error("Permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    /// IO failure while reading
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Delimited file without a usable header row
    #[error("No header row in {}", .0.display())]
    MissingHeader(PathBuf),

    /// Malformed delimited content
    #[error("CSV parsing error in {} at record {record}: {error}", path.display())]
    Csv {
        path: PathBuf,
        record: u64,
        error: String,
    },

    /// Malformed line in a line-delimited JSON file
    #[error("JSON parsing error in {} at line {line}: {error}", path.display())]
    JsonLine {
        path: PathBuf,
        line: usize,
        error: String,
    },

    /// Markup that cannot be parsed into a tree
    #[error("XML parsing error in {}: {error}", path.display())]
    Xml { path: PathBuf, error: String },
}

impl ParseError {
    /// Map an IO error on `path` to the matching variant
    pub fn from_io(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ParseError::FileNotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => {
                ParseError::PermissionDenied(path.to_path_buf())
            }
            _ => ParseError::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    /// The input file this error refers to
    pub fn path(&self) -> &Path {
        match self {
            ParseError::FileNotFound(path)
            | ParseError::PermissionDenied(path)
            | ParseError::MissingHeader(path) => path,
            ParseError::Io { path, .. }
            | ParseError::Csv { path, .. }
            | ParseError::JsonLine { path, .. }
            | ParseError::Xml { path, .. } => path,
        }
    }

    /// Short machine-readable kind, used in failure records
    pub fn kind(&self) -> &'static str {
        match self {
            ParseError::FileNotFound(_) => "FileNotFound",
            ParseError::PermissionDenied(_) => "PermissionDenied",
            ParseError::Io { .. } => "Io",
            ParseError::MissingHeader(_) => "MissingHeader",
            ParseError::Csv { .. } => "MalformedCsv",
            ParseError::JsonLine { .. } => "MalformedJson",
            ParseError::Xml { .. } => "MalformedXml",
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            ParseError::FileNotFound(path) => format!(
                "File not found: {}\n\nHint: Every source must provide a .csv, .json and .xml file under the data root.",
                path.display()
            ),
            ParseError::PermissionDenied(path) => format!(
                "Permission denied: {}\n\nHint: Check that the file is readable by the current user.",
                path.display()
            ),
            ParseError::JsonLine { path, line, error } => format!(
                "JSON parse error in {} at line {line}:\n{error}\n\n\
                Hint: Each non-blank line must hold exactly one JSON object.",
                path.display()
            ),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_not_found() {
        let err = ParseError::from_io(
            Path::new("data/source1.xml"),
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, ParseError::FileNotFound(_)));
        assert_eq!(err.kind(), "FileNotFound");
        assert_eq!(err.path(), Path::new("data/source1.xml"));
    }

    #[test]
    fn test_from_io_other() {
        let err = ParseError::from_io(
            Path::new("a.csv"),
            std::io::Error::new(std::io::ErrorKind::InvalidData, "bad bytes"),
        );
        assert!(matches!(err, ParseError::Io { .. }));
        assert!(err.to_string().contains("a.csv"));
    }

    #[test]
    fn test_user_message() {
        let err = ParseError::JsonLine {
            path: PathBuf::from("s.json"),
            line: 3,
            error: "expected value".to_string(),
        };
        let msg = err.user_message();
        assert!(msg.contains("line 3"));
        assert!(msg.contains("Hint:"));
    }
}
