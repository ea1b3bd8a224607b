//! Value classification: copy concrete data, wrap everything else

use std::collections::BTreeSet;
use std::rc::Rc;

use crate::recording::RecordingProxy;
use crate::traits::{Live, LiveArgs, Subject};
use crate::types::{Args, Node};

#[derive(Debug, Default)]
struct ClassifierConfig {
    additional_concrete_types: BTreeSet<String>,
}

/// Decides which parts of a live value are copied and which get a recording proxy
///
/// Scalars are always concrete. Composites are rebuilt element by element.
/// Dependencies become nested [`RecordingProxy`] instances unless their type
/// name was registered as concrete and they provide a snapshot.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    config: Rc<ClassifierConfig>,
}

impl Classifier {
    /// Create a classifier with the base concrete set
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat dependencies reporting `type_name` as plain data
    pub fn with_concrete_type(self, type_name: impl Into<String>) -> Self {
        let mut types = self.config.additional_concrete_types.clone();
        types.insert(type_name.into());
        Self {
            config: Rc::new(ClassifierConfig {
                additional_concrete_types: types,
            }),
        }
    }

    pub fn with_concrete_types<I, S>(self, type_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        type_names
            .into_iter()
            .fold(self, |classifier, name| classifier.with_concrete_type(name))
    }

    /// Type names registered as concrete on top of the base set
    pub fn additional_concrete_types(&self) -> impl Iterator<Item = &str> {
        self.config.additional_concrete_types.iter().map(String::as_str)
    }

    pub fn is_concrete_type(&self, type_name: &str) -> bool {
        self.config.additional_concrete_types.contains(type_name)
    }

    /// Classify a live value, wrapping every dependency it contains
    pub fn classify(&self, value: Live) -> Node<RecordingProxy> {
        value.graft(&mut |subject| self.classify_subject(subject))
    }

    /// Classify the arguments a live dependency passes back into a proxy
    pub fn classify_args(&self, args: LiveArgs) -> Args<RecordingProxy> {
        args.graft(&mut |subject| self.classify_subject(subject))
    }

    fn classify_subject(&self, subject: Box<dyn Subject>) -> Node<RecordingProxy> {
        if let Some(proxy) = subject.as_recording() {
            return Node::Proxy(proxy);
        }
        if self.is_concrete_type(subject.type_name()) {
            if let Some(snapshot) = subject.snapshot() {
                return snapshot.lift();
            }
        }
        tracing::trace!(type_name = subject.type_name(), "wrapping value in recording proxy");
        Node::Proxy(RecordingProxy::with_classifier(subject, self.clone()))
    }
}
