use core::fmt;

use itertools::join;
use thiserror::Error;

#[derive(Error, Clone, Debug, PartialEq, Eq, Default)]
#[error("Invalid Path")]
pub struct PathError {}

/// Topic names are absolute, `/`-separated, and made of alphanumerics or `_`.
pub fn validate_path(path: &str) -> bool {
    path.starts_with('/')
        && path
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '/')
}

fn validate_part(part: &str) -> bool {
    !part.is_empty() && part.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Normalized topic path: one leading `/`, no empty segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    path: String,
}

impl Path {
    pub fn from_str(path: &str) -> Result<Self, PathError> {
        if validate_path(path) {
            Ok(Path {
                path: format!("/{}", join(Self::split_parts(path), "/")),
            })
        } else {
            Err(PathError::default())
        }
    }

    /// Appends one segment.
    pub fn join(&self, part: &str) -> Result<Self, PathError> {
        if !validate_part(part) {
            return Err(PathError::default());
        }

        let path = if self.is_root() {
            format!("/{part}")
        } else {
            format!("{}/{part}", self.path)
        };

        Ok(Path { path })
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    fn split_parts(path: &str) -> impl Iterator<Item = &str> {
        path.split('/').filter(|p| !p.is_empty())
    }

    pub fn is_root(&self) -> bool {
        self.path == "/"
    }
}

impl From<Path> for String {
    fn from(value: Path) -> Self {
        value.path
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
