//! Source text access and the normalization shared by listing text and source
//! lines.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Failure to load a source file named by a listing.
#[derive(Debug, Error)]
pub enum SourceError {
    /// No search root holds a file with this name.
    #[error("source file not found: {name}")]
    NotFound {
        /// File name as referenced by the listing.
        name: String,
    },
    /// The file exists but could not be read as UTF-8 text.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Resolved path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

/// Resolves source file names referenced by a listing to their text.
pub trait SourceProvider {
    /// Loads the full text of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the file cannot be resolved or read.
    fn load(&self, name: &str) -> Result<String, SourceError>;

    /// Name under which `name` is reported to hosts, or `None` when it does
    /// not resolve. Defaults to `name` itself.
    fn resolved_name(&self, name: &str) -> Option<String> {
        Some(name.to_string())
    }
}

/// Reads sources from disk, trying each search root in order.
///
/// A name is tried as given (absolute, or relative to each root), then by its
/// final path component, for listings produced on another machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FsSourceProvider {
    roots: Vec<PathBuf>,
}

impl FsSourceProvider {
    /// Creates a provider searching `roots` in order.
    #[must_use]
    pub fn new(roots: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    /// Search roots in lookup order.
    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Resolves `name` to an existing file.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let requested = Path::new(name);
        if requested.is_absolute() && requested.is_file() {
            return Some(requested.to_path_buf());
        }
        let file_name = normalized_file_name(name);
        self.roots
            .iter()
            .map(|root| root.join(requested))
            .chain(
                file_name
                    .iter()
                    .flat_map(|file_name| self.roots.iter().map(move |root| root.join(file_name))),
            )
            .find(|candidate| candidate.is_file())
    }
}

/// Final component of `name`, treating both `/` and `\` as separators.
fn normalized_file_name(name: &str) -> Option<String> {
    name.rsplit(['/', '\\'])
        .next()
        .filter(|file_name| !file_name.is_empty())
        .map(ToString::to_string)
}

impl SourceProvider for FsSourceProvider {
    fn load(&self, name: &str) -> Result<String, SourceError> {
        let path = self.resolve(name).ok_or_else(|| SourceError::NotFound {
            name: name.to_string(),
        })?;
        fs::read_to_string(&path).map_err(|source| SourceError::Io { path, source })
    }

    /// The canonical path of the resolved file.
    fn resolved_name(&self, name: &str) -> Option<String> {
        let path = self.resolve(name)?;
        let path = fs::canonicalize(&path).unwrap_or(path);
        Some(path.display().to_string())
    }
}

/// Serves source text held in memory, keyed by the name the listing uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySourceProvider {
    files: HashMap<String, String>,
}

impl MemorySourceProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a file.
    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.files.insert(name.into(), text.into());
    }

    /// Builder form of [`Self::insert`].
    #[must_use]
    pub fn with_file(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(name, text);
        self
    }
}

impl SourceProvider for MemorySourceProvider {
    fn load(&self, name: &str) -> Result<String, SourceError> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| SourceError::NotFound {
                name: name.to_string(),
            })
    }

    fn resolved_name(&self, name: &str) -> Option<String> {
        self.files.contains_key(name).then(|| name.to_string())
    }
}

impl<T: SourceProvider + ?Sized> SourceProvider for &T {
    fn load(&self, name: &str) -> Result<String, SourceError> {
        (**self).load(name)
    }

    fn resolved_name(&self, name: &str) -> Option<String> {
        (**self).resolved_name(name)
    }
}

/// Canonical form used to compare listing text with source lines: comment
/// stripped, whitespace runs collapsed, uppercased, and no whitespace around
/// `,` or the arithmetic operators.
#[must_use]
pub fn normalize(text: &str) -> String {
    let code = strip_comment(text);
    let mut out = String::with_capacity(code.len());
    let mut pending_space = false;
    for c in code.chars() {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space && !is_tight_operator(c) && !out.ends_with(is_tight_operator) {
            out.push(' ');
        }
        pending_space = false;
        out.extend(c.to_uppercase());
    }
    out
}

const fn is_tight_operator(c: char) -> bool {
    matches!(c, ',' | '+' | '-' | '*' | '/')
}

/// Cuts a trailing `;` comment, ignoring semicolons inside quoted strings.
/// The apostrophe of `AF'` does not open a string.
fn strip_comment(text: &str) -> &str {
    let mut quote: Option<char> = None;
    for (index, c) in text.char_indices() {
        match (quote, c) {
            (Some(open), _) if c == open => quote = None,
            (Some(_), _) => {}
            (None, ';') => return &text[..index],
            (None, '"') => quote = Some('"'),
            (None, '\'') if !is_shadow_af(&text[..index]) => quote = Some('\''),
            (None, _) => {}
        }
    }
    text
}

/// Returns `true` when `prefix` ends with a standalone `AF` register name.
fn is_shadow_af(prefix: &str) -> bool {
    let bytes = prefix.as_bytes();
    let Some(split) = bytes.len().checked_sub(2) else {
        return false;
    };
    if !bytes[split..].eq_ignore_ascii_case(b"AF") {
        return false;
    }
    split == 0 || !(bytes[split - 1].is_ascii_alphanumeric() || bytes[split - 1] == b'_')
}
