//! Session that binds named dependencies to recorders or replayers
//!
//! In record mode each dependency is connected for real and wrapped in a
//! [`RecordingProxy`]; [`DependencyIsolation::finish`] then clears the old
//! artifacts under the prefix and writes one artifact per dependency. In
//! replay mode dependencies are never connected: each name is answered by
//! the [`ReplaySubstitute`] loaded from its artifact.
//!
//! ```no_run
//! use interaction_replay::{DependencyIsolation, FunctionSubject, IsolationConfig, Live, Mode, Proxy};
//!
//! let config = IsolationConfig::new("recordings/test_checkout_").with_mode(Mode::Record);
//! let mut session = DependencyIsolation::new(config);
//! let clock = session
//!     .bind("clock", || FunctionSubject::new("now", |_| Ok(Live::from(1_700_000_000))))
//!     .unwrap();
//! let _now = clock.invoke(Default::default()).unwrap();
//! session.finish().unwrap();
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::classifier::Classifier;
use crate::config::{IsolationConfig, Mode};
use crate::error::IsolationError;
use crate::hasher::DocumentHasher;
use crate::recording::RecordingProxy;
use crate::serialization::JsonSerializer;
use crate::store::{InteractionStore, StoreOutcome};
use crate::substitute::Substitute;
use crate::traits::Subject;
use crate::types::Fingerprint;

#[cfg(doc)]
use crate::replay::ReplaySubstitute;

/// What a finished session wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolationSummary {
    pub mode: Mode,
    /// Stale artifacts deleted before writing
    pub removed: usize,
    /// Per-dependency store outcome, in binding order
    pub artifacts: Vec<(String, StoreOutcome)>,
}

impl IsolationSummary {
    pub fn outcome(&self, name: &str) -> Option<&StoreOutcome> {
        self.artifacts
            .iter()
            .find(|(bound, _)| bound == name)
            .map(|(_, outcome)| outcome)
    }

    pub fn written(&self) -> usize {
        self.artifacts
            .iter()
            .filter(|(_, outcome)| matches!(outcome, StoreOutcome::Written { .. }))
            .count()
    }

    /// Combined fingerprint of every written artifact, `None` if nothing was written
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        let fingerprints: Vec<_> = self
            .artifacts
            .iter()
            .filter_map(|(_, outcome)| match outcome {
                StoreOutcome::Written { fingerprint, .. } => Some(*fingerprint),
                StoreOutcome::Removed { .. } => None,
            })
            .collect();
        if fingerprints.is_empty() {
            return None;
        }
        Some(DocumentHasher::new().hash_chain(&fingerprints))
    }
}

/// Named dependency isolation for one test session
pub struct DependencyIsolation {
    config: IsolationConfig,
    store: InteractionStore<JsonSerializer>,
    classifier: Classifier,
    bindings: Vec<(String, Substitute)>,
    finished: bool,
}

impl DependencyIsolation {
    pub fn new(config: IsolationConfig) -> Self {
        tracing::info!(
            mode = %config.mode,
            prefix = %config.artifact_prefix,
            "starting dependency isolation"
        );
        let classifier = Classifier::new().with_concrete_types(config.additional_concrete_types.iter().cloned());
        Self {
            store: InteractionStore::new(JsonSerializer::with_pretty(config.pretty)),
            classifier,
            config,
            bindings: Vec::new(),
            finished: false,
        }
    }

    pub fn config(&self) -> &IsolationConfig {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.config.mode
    }

    /// Artifact file for the dependency `name`
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        PathBuf::from(format!("{}{}.json", self.config.artifact_prefix, name))
    }

    /// Bind `name` to a recorder around `connect()` or to its replayed artifact
    ///
    /// `connect` only runs in record mode.
    pub fn bind<S, F>(&mut self, name: &str, connect: F) -> Result<Substitute, IsolationError>
    where
        S: Subject + 'static,
        F: FnOnce() -> S,
    {
        if self.bound(name).is_some() {
            return Err(IsolationError::DuplicateBinding { name: name.to_string() });
        }

        let substitute = match self.config.mode {
            Mode::Record => {
                let subject: Box<dyn Subject> = Box::new(connect());
                Substitute::from(RecordingProxy::with_classifier(subject, self.classifier.clone()))
            }
            Mode::Replay => {
                let path = self.artifact_path(name);
                let loaded = self.store.load_from_file(&path).map_err(|source| IsolationError::Store {
                    name: name.to_string(),
                    source,
                })?;
                Substitute::from(loaded)
            }
        };

        tracing::debug!(dependency = name, mode = %self.config.mode, "bound dependency");
        self.bindings.push((name.to_string(), substitute.clone()));
        Ok(substitute)
    }

    /// The substitute bound to `name`, if any
    pub fn bound(&self, name: &str) -> Option<&Substitute> {
        self.bindings
            .iter()
            .find(|(bound, _)| bound == name)
            .map(|(_, substitute)| substitute)
    }

    /// Names bound so far, in binding order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|(name, _)| name.as_str())
    }

    /// Close the session, writing artifacts in record mode
    pub fn finish(mut self) -> Result<IsolationSummary, IsolationError> {
        self.finished = true;
        let mode = self.config.mode;
        if mode == Mode::Replay {
            tracing::info!(dependencies = self.bindings.len(), "finished replay isolation");
            return Ok(IsolationSummary {
                mode,
                removed: 0,
                artifacts: Vec::new(),
            });
        }

        let removed = self.clear_artifacts()?;
        let mut artifacts = Vec::with_capacity(self.bindings.len());
        for (name, substitute) in &self.bindings {
            let Some(proxy) = substitute.as_recording() else {
                continue;
            };
            let outcome = self
                .store
                .store_to_file(proxy, self.artifact_path(name))
                .map_err(|source| IsolationError::Store {
                    name: name.clone(),
                    source,
                })?;
            artifacts.push((name.clone(), outcome));
        }

        let summary = IsolationSummary {
            mode,
            removed,
            artifacts,
        };
        tracing::info!(
            removed,
            written = summary.written(),
            dependencies = self.bindings.len(),
            "finished recording isolation"
        );
        Ok(summary)
    }

    /// Delete every file whose path starts with the artifact prefix
    fn clear_artifacts(&self) -> Result<usize, IsolationError> {
        let prefix = &self.config.artifact_prefix;
        let (directory, file_prefix) = split_prefix(prefix);
        let cleanup = |source: io::Error| IsolationError::Cleanup {
            prefix: prefix.clone(),
            source,
        };

        let entries = match fs::read_dir(&directory) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(cleanup(err)),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(cleanup)?;
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            // `*` never matches a leading dot
            if !file_name.starts_with(&file_prefix) || (file_prefix.is_empty() && file_name.starts_with('.')) {
                continue;
            }
            if !entry.file_type().map_err(cleanup)?.is_file() {
                continue;
            }
            fs::remove_file(entry.path()).map_err(cleanup)?;
            tracing::debug!(path = %entry.path().display(), "removed stale artifact");
            removed += 1;
        }
        Ok(removed)
    }
}

/// Directory to scan and file-name prefix to match for an artifact prefix
fn split_prefix(prefix: &str) -> (PathBuf, String) {
    if prefix.is_empty() || prefix.ends_with(std::path::is_separator) {
        let directory = if prefix.is_empty() { "." } else { prefix };
        return (PathBuf::from(directory), String::new());
    }
    let path = Path::new(prefix);
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_prefix = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    (directory, file_prefix)
}

impl Drop for DependencyIsolation {
    fn drop(&mut self) {
        if !self.finished && self.config.mode == Mode::Record && !self.bindings.is_empty() {
            tracing::warn!(
                prefix = %self.config.artifact_prefix,
                dependencies = self.bindings.len(),
                "recording isolation dropped without finish, interactions were not stored"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_path_appends_name() {
        let session = DependencyIsolation::new(IsolationConfig::new("out/test_a_"));
        assert_eq!(session.artifact_path("db"), PathBuf::from("out/test_a_db.json"));
    }

    #[test]
    fn test_split_prefix() {
        assert_eq!(
            split_prefix("out/test_a_"),
            (PathBuf::from("out"), "test_a_".to_string())
        );
        assert_eq!(split_prefix("out/"), (PathBuf::from("out/"), String::new()));
        assert_eq!(split_prefix("test_"), (PathBuf::from("."), "test_".to_string()));
    }

    #[test]
    fn test_replay_never_connects() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = format!("{}/", dir.path().display());
        let mut session = DependencyIsolation::new(IsolationConfig::new(prefix));

        let substitute = session
            .bind("db", || -> crate::subject::FunctionSubject { panic!("must not connect in replay") })
            .unwrap();

        assert!(!substitute.is_recording());
        assert!(substitute.as_replay().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_binding() {
        let mut session = DependencyIsolation::new(IsolationConfig::default());
        session
            .bind("db", || crate::subject::ObjectSubject::new("Db"))
            .unwrap();
        let err = session
            .bind("db", || crate::subject::ObjectSubject::new("Db"))
            .unwrap_err();
        assert!(matches!(err, IsolationError::DuplicateBinding { name } if name == "db"));
    }
}
