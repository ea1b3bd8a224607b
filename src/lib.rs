//! Interaction Replay
//!
//! A library for recording every interaction a piece of code has with its
//! dependencies and replaying those interactions deterministically later,
//! without the dependencies being present.

pub mod classifier;
pub mod config;
pub mod encoding;
pub mod error;
pub mod hasher;
pub mod interaction;
pub mod isolation;
pub mod recording;
pub mod replay;
pub mod serialization;
pub mod store;
pub mod subject;
pub mod substitute;
pub mod traits;
pub mod types;

// Re-export core types and traits
pub use classifier::Classifier;
pub use config::{IsolationConfig, Mode, MODE_ENV_VAR};
pub use encoding::{InteractionCodec, TypeTag};
pub use error::{
    ConfigError, DecodeError, EncodeError, Fault, IsolationError, ObjectIdError, ProxyError, SerializationError,
    StoreError,
};
pub use hasher::DocumentHasher;
pub use interaction::{AttributeEntry, CallRecord, InteractionLog, ProtocolSlot};
pub use isolation::{DependencyIsolation, IsolationSummary};
pub use recording::RecordingProxy;
pub use replay::{RecordedAccesses, ReplaySubstitute, ReplaySubstituteBuilder};
pub use serialization::{DocumentSerializer, JsonSerializer};
pub use store::{InteractionStore, StoreOutcome};
pub use subject::{ready, FunctionSubject, ObjectSubject};
pub use substitute::Substitute;
pub use traits::{AsyncCall, Attribute, Live, LiveArgs, LiveAttribute, LiveFuture, Proxy, ProxyFuture, Subject};
pub use types::{Args, Fingerprint, Node, ObjectId, Outcome, Scalar, Value};
