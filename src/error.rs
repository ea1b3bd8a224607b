//! Error types for interaction recording and replay

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// An exception raised by a dependency, or re-raised from a recording
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct Fault {
    /// Exception class name, e.g. `ValueError`
    pub kind: String,
    pub message: String,
}

impl Fault {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new("ValueError", message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }

    pub fn attribute_error(message: impl Into<String>) -> Self {
        Self::new("AttributeError", message)
    }

    pub fn stop_async_iteration() -> Self {
        Self::new("StopAsyncIteration", "")
    }
}

/// Errors surfaced through a proxy to the calling code
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProxyError {
    /// The dependency raised (recording) or a captured exception was re-raised (replay)
    #[error(transparent)]
    Raised(#[from] Fault),

    #[error("attribute {name:?} not found in replayed interactions")]
    AttributeNotRecorded { name: String },

    #[error("attribute {name:?} has no replayable accesses left ({recorded} recorded)")]
    AttributeExhausted { name: String, recorded: usize },

    #[error("no more recorded calls to replay ({recorded} recorded)")]
    CallsExhausted { recorded: usize },

    #[error("attribute {name:?} is asynchronous and must be called and awaited")]
    AsyncAttribute { name: String },

    #[error("attribute {name:?} is not callable (found {found})")]
    NotCallable { name: String, found: &'static str },

    #[error("proxy for {type_name} was re-entered while a call on it was in progress")]
    Reentrant { type_name: String },

    #[error("a {found} handle cannot be passed to a {expected}")]
    MixedHandles {
        expected: &'static str,
        found: &'static str,
    },
}

impl ProxyError {
    /// The exception a live dependency sees when it calls back into a proxy
    pub fn into_fault(self) -> Fault {
        match self {
            ProxyError::Raised(fault) => fault,
            other => Fault::new("RuntimeError", other.to_string()),
        }
    }
}

/// Errors produced while encoding an interaction tree
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("value of type {type_name} is not supported by the interaction encoder: {reason}")]
    UnsupportedValue {
        type_name: &'static str,
        reason: String,
    },

    #[error("mapping key {key:?} is reserved for type tags")]
    ReservedKey { key: String },

    #[error("recording proxy for {type_name} is being mutated and cannot be encoded")]
    ProxyBusy { type_name: String },

    #[error("recording proxy for {type_name} reaches itself through recorded call arguments")]
    CyclicRecording { type_name: String },
}

/// Errors produced while decoding an interaction document
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("expected a mapping for {context}, got {found}")]
    NotAMapping {
        context: &'static str,
        found: &'static str,
    },

    #[error("expected a list for {context}, got {found}")]
    NotAList {
        context: &'static str,
        found: &'static str,
    },

    #[error("missing __type__ tag for {context}")]
    MissingTypeTag { context: &'static str },

    #[error("expected __type__ set to {expected:?} instead of {found}")]
    UnexpectedTag { expected: &'static str, found: String },

    #[error("attribute {name:?} accesses must be a list or a {{\"__repeat__\": value}} mapping")]
    MissingRepeat { name: String },

    #[error("unknown __type__ tag {tag:?}")]
    UnknownTag { tag: String },

    #[error("{tag} entry has no value")]
    MissingValue { tag: &'static str },

    #[error("tag {tag:?} is only valid for a recorded entry, not inside a value")]
    MisplacedTag { tag: &'static str },

    #[error("invalid {tag} literal {value:?}: {reason}")]
    InvalidLiteral {
        tag: &'static str,
        value: String,
        reason: String,
    },

    #[error("malformed recorded call: {reason}")]
    MalformedCall { reason: String },

    #[error("a plain value cannot contain a RecordingMock")]
    ProxyInValue,

    #[error("number {value} is out of the supported integer range")]
    NumberOutOfRange { value: String },
}

/// Errors from the document serialization layer
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("Serialization failed: {reason}")]
    SerializationFailed { reason: String },

    #[error("Deserialization failed: {reason}")]
    DeserializationFailed { reason: String },
}

/// Errors from reading or writing interaction artifacts
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Encoding error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Decoding error in {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from parsing configuration values
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid mode {value:?}: expected \"record\" or \"replay\"")]
    InvalidMode { value: String },
}

/// Errors from an isolation session
#[derive(Debug, Error)]
pub enum IsolationError {
    #[error("dependency {name:?} is already bound in this session")]
    DuplicateBinding { name: String },

    #[error("Store error for dependency {name:?}: {source}")]
    Store {
        name: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to clear artifacts under {prefix}: {source}")]
    Cleanup {
        prefix: String,
        #[source]
        source: std::io::Error,
    },
}

/// Invalid canonical text for an object id
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjectIdError {
    #[error("invalid object id {value:?}: expected 24 hex digits")]
    Invalid { value: String },
}
