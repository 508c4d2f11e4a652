//! Command path resolution
//!
//! A push to `org/repo` on `refs/heads/main` maps to
//! `<root>/org/repo/refs/heads/main`, optionally followed by one of the
//! configured extensions. Both name components come straight from the
//! payload, so each is cleaned lexically against a virtual root before it is
//! joined: `..` can only cancel segments that came earlier in the same
//! component and can never climb out of the command root.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

/// Maps push events onto executable paths below a command root
#[derive(Debug, Clone)]
pub struct CommandResolver {
    root: PathBuf,
    extensions: Vec<String>,
}

impl CommandResolver {
    pub fn new(root: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            root: root.into(),
            extensions,
        }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// `root / sanitize(repository) / sanitize(git_ref)`.
    ///
    /// Returns `None` when either component cleans down to nothing, since the
    /// result would name a directory rather than a command.
    pub fn base_path(&self, repository: &str, git_ref: &str) -> Option<PathBuf> {
        let repository = sanitize(repository);
        let git_ref = sanitize(git_ref);

        if repository.as_os_str().is_empty() || git_ref.as_os_str().is_empty() {
            return None;
        }

        Some(self.root.join(repository).join(git_ref))
    }

    /// Base path followed by each extension variant, in configured order
    pub fn candidates(&self, repository: &str, git_ref: &str) -> Vec<PathBuf> {
        let Some(base) = self.base_path(repository, git_ref) else {
            return Vec::new();
        };

        let mut candidates = Vec::with_capacity(self.extensions.len() + 1);
        candidates.push(base.clone());
        candidates.extend(self.extensions.iter().map(|ext| with_suffix(&base, ext)));
        candidates
    }

    /// First candidate that exists as a regular file
    pub async fn resolve(&self, repository: &str, git_ref: &str) -> Option<PathBuf> {
        let mut found = None;
        for candidate in self.candidates(repository, git_ref) {
            if is_regular_file(&candidate).await {
                found = Some(candidate);
                break;
            }
        }

        debug!(
            repository = repository,
            git_ref = git_ref,
            found = ?found,
            "Resolved hook command"
        );

        found
    }
}

/// Lexically clean one untrusted name component into a relative path.
///
/// Empty and `.` segments are dropped, `..` removes the previous segment if
/// there is one, and root or drive prefixes are discarded.
pub fn sanitize(component: &str) -> PathBuf {
    let mut cleaned = PathBuf::new();

    for part in Path::new(component).components() {
        match part {
            Component::Normal(segment) => cleaned.push(segment),
            Component::ParentDir => {
                cleaned.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }

    cleaned
}

/// Whether `path` currently names a regular file (symlinks followed)
pub async fn is_regular_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut path = OsString::from(base.as_os_str());
    path.push(suffix);
    PathBuf::from(path)
}
