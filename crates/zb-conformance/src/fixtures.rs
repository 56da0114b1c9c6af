#![forbid(unsafe_code)]

//! Fixture resolver: named JSON request templates with `{{token}}`
//! placeholders, substituted from the shared property store (which the
//! config pre-seeds with the environment tokens: auth token, organization
//! id, base URLs).
//!
//! An unresolved token is a hard setup failure. Substituting an empty
//! string instead would let a later equivalence check pass vacuously, which
//! is exactly the false positive this harness exists to rule out.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::store::PropertyStore;
use crate::SetupError;

#[derive(Debug, Clone)]
pub struct FixtureSet {
    root: PathBuf,
    names: BTreeSet<String>,
}

impl FixtureSet {
    /// Scans the fixture root for `<name>.json` templates.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, SetupError> {
        let root = root.as_ref().to_path_buf();
        let entries = fs::read_dir(&root).map_err(|err| SetupError::FixtureRootMissing {
            path: root.display().to_string(),
            detail: err.to_string(),
        })?;
        let mut names = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(|err| SetupError::Io {
                path: root.display().to_string(),
                detail: err.to_string(),
            })?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                    names.insert(stem.to_string());
                }
            }
        }
        Ok(Self { root, names })
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Resolves a named template into a concrete JSON payload.
    pub fn resolve(&self, name: &str, store: &PropertyStore) -> Result<Value, SetupError> {
        if !self.names.contains(name) {
            return Err(SetupError::FixtureNotFound(name.to_string()));
        }
        let path = self.root.join(format!("{name}.json"));
        let template = fs::read_to_string(&path).map_err(|err| SetupError::Io {
            path: path.display().to_string(),
            detail: err.to_string(),
        })?;
        let resolved = substitute(name, &template, store)?;
        serde_json::from_str(&resolved).map_err(|err| SetupError::FixtureParse {
            fixture: name.to_string(),
            detail: err.to_string(),
        })
    }

    /// SHA-256 over the sorted fixture names and their raw bytes. Recorded
    /// in the run report so two runs can be tied to the same fixture corpus.
    pub fn fingerprint(&self) -> Result<String, SetupError> {
        let mut hasher = Sha256::new();
        for name in &self.names {
            let path = self.root.join(format!("{name}.json"));
            let bytes = fs::read(&path).map_err(|err| SetupError::Io {
                path: path.display().to_string(),
                detail: err.to_string(),
            })?;
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
            hasher.update(&bytes);
        }
        let digest = hasher.finalize();
        let mut out = String::with_capacity(digest.len() * 2);
        for byte in digest {
            out.push_str(&format!("{byte:02x}"));
        }
        Ok(out)
    }
}

/// Single left-to-right pass; substituted values are emitted verbatim and
/// never re-scanned.
fn substitute(fixture: &str, template: &str, store: &PropertyStore) -> Result<String, SetupError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| SetupError::UnresolvedPlaceholder {
                fixture: fixture.to_string(),
                token: after.chars().take(32).collect(),
            })?;
        let token = after[..end].trim();
        let value = store
            .get(token)
            .map_err(|_| SetupError::UnresolvedPlaceholder {
                fixture: fixture.to_string(),
                token: token.to_string(),
            })?;
        out.push_str(value);
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}
