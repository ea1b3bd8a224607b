//! Persisting recorded interactions as artifacts on disk

use std::fs;
use std::io;
use std::path::Path;

use crate::encoding::InteractionCodec;
use crate::error::StoreError;
use crate::hasher::DocumentHasher;
use crate::recording::RecordingProxy;
use crate::replay::ReplaySubstitute;
use crate::serialization::{DocumentSerializer, JsonSerializer};
use crate::types::Fingerprint;

/// What a store call did to the artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// The artifact was (re)written
    Written { fingerprint: Fingerprint, bytes: usize },
    /// Nothing was recorded; any previous artifact was deleted
    Removed { existed: bool },
}

/// Writes recordings to and loads substitutes from artifact files
#[derive(Debug, Clone, Default)]
pub struct InteractionStore<S: DocumentSerializer = JsonSerializer> {
    codec: InteractionCodec,
    serializer: S,
    hasher: DocumentHasher,
}

impl InteractionStore<JsonSerializer> {
    /// Store writing pretty-printed JSON artifacts
    pub fn json() -> Self {
        Self::new(JsonSerializer::new())
    }
}

impl<S: DocumentSerializer> InteractionStore<S> {
    pub fn new(serializer: S) -> Self {
        Self {
            codec: InteractionCodec::new(),
            serializer,
            hasher: DocumentHasher::new(),
        }
    }

    pub fn serializer(&self) -> &S {
        &self.serializer
    }

    /// Encode `proxy` and write it to `path`
    ///
    /// An empty recording deletes the artifact instead. Missing parent
    /// directories are created.
    pub fn store_to_file(&self, proxy: &RecordingProxy, path: impl AsRef<Path>) -> Result<StoreOutcome, StoreError> {
        let path = path.as_ref();
        let document = match self.codec.encode(proxy)? {
            Some(document) => document,
            None => {
                let existed = remove_if_exists(path)?;
                tracing::debug!(path = %path.display(), existed, "no interactions recorded, removed artifact");
                return Ok(StoreOutcome::Removed { existed });
            }
        };

        let bytes = self.serializer.serialize(&document)?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, &bytes).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let fingerprint = self.hasher.hash(&document);
        tracing::debug!(
            path = %path.display(),
            bytes = bytes.len(),
            %fingerprint,
            serializer = self.serializer.name(),
            "stored interaction artifact"
        );
        Ok(StoreOutcome::Written {
            fingerprint,
            bytes: bytes.len(),
        })
    }

    /// Load the substitute recorded at `path`
    ///
    /// A missing artifact means nothing was recorded and yields an empty
    /// substitute.
    pub fn load_from_file(&self, path: impl AsRef<Path>) -> Result<ReplaySubstitute, StoreError> {
        let path = path.as_ref();
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no artifact, replaying an empty recording");
                return Ok(ReplaySubstitute::empty());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let document = self.serializer.deserialize(&bytes)?;
        let substitute = self.codec.decode(&document).map_err(|source| StoreError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "loaded interaction artifact");
        Ok(substitute)
    }
}

/// Returns whether a file was there to delete
fn remove_if_exists(path: &Path) -> Result<bool, StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subject::ObjectSubject;
    use crate::traits::{Live, Proxy};

    #[test]
    fn test_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("point.json");
        let proxy = RecordingProxy::new(ObjectSubject::new("Point").with_value("x", || Live::from(7)));
        proxy.attribute("x").unwrap();

        let store = InteractionStore::json();
        let outcome = store.store_to_file(&proxy, &path).unwrap();
        assert!(matches!(outcome, StoreOutcome::Written { bytes, .. } if bytes > 0));

        let substitute = store.load_from_file(&path).unwrap();
        assert_eq!(substitute.attribute("x").unwrap(), crate::types::Node::from(7));
    }

    #[test]
    fn test_empty_recording_removes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("idle.json");
        fs::write(&path, b"{}").unwrap();

        let store = InteractionStore::json();
        let proxy = RecordingProxy::new(ObjectSubject::new("Idle"));

        assert_eq!(
            store.store_to_file(&proxy, &path).unwrap(),
            StoreOutcome::Removed { existed: true }
        );
        assert!(!path.exists());
        assert_eq!(
            store.store_to_file(&proxy, &path).unwrap(),
            StoreOutcome::Removed { existed: false }
        );
    }

    #[test]
    fn test_missing_artifact_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let substitute = InteractionStore::json()
            .load_from_file(dir.path().join("absent.json"))
            .unwrap();
        assert!(substitute.is_empty());
    }

    #[test]
    fn test_malformed_artifact_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, br#"{"__type__": "tuple", "value": []}"#).unwrap();

        let err = InteractionStore::json().load_from_file(&path).unwrap_err();
        match err {
            StoreError::Decode { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("expected a decode error, got {other:?}"),
        }
    }
}
