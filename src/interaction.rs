//! In-memory interaction log kept by each proxy

use std::collections::BTreeMap;

use crate::types::{Args, Node, Outcome};

/// Attribute names under which protocol interactions are logged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolSlot {
    Enter,
    Exit,
    AsyncEnter,
    AsyncExit,
    AsyncIter,
    AsyncNext,
}

impl ProtocolSlot {
    pub const ALL: [ProtocolSlot; 6] = [
        ProtocolSlot::Enter,
        ProtocolSlot::Exit,
        ProtocolSlot::AsyncEnter,
        ProtocolSlot::AsyncExit,
        ProtocolSlot::AsyncIter,
        ProtocolSlot::AsyncNext,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolSlot::Enter => "__enter__",
            ProtocolSlot::Exit => "__exit__",
            ProtocolSlot::AsyncEnter => "__aenter__",
            ProtocolSlot::AsyncExit => "__aexit__",
            ProtocolSlot::AsyncIter => "__aiter__",
            ProtocolSlot::AsyncNext => "__anext__",
        }
    }

    /// The slot logged under `name`, if it is a reserved protocol name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.as_str() == name)
    }
}

/// One recorded value for an attribute name
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeEntry<P> {
    pub outcome: Outcome<P>,
    /// Produced by an awaited operation rather than a plain read
    pub asynchronous: bool,
}

impl<P> AttributeEntry<P> {
    pub fn value(node: Node<P>) -> Self {
        Self {
            outcome: Outcome::Returned(node),
            asynchronous: false,
        }
    }

    pub fn asynchronous(outcome: Outcome<P>) -> Self {
        Self {
            outcome,
            asynchronous: true,
        }
    }
}

/// One recorded invocation of the proxied object itself
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord<P> {
    pub args: Args<P>,
    pub result: Node<P>,
}

/// Interactions observed on one proxy
///
/// Each attribute name owns an independent queue; there is no ordering across names.
#[derive(Debug, Clone)]
pub struct InteractionLog<P> {
    attributes: BTreeMap<String, Vec<AttributeEntry<P>>>,
    calls: Vec<CallRecord<P>>,
}

impl<P> InteractionLog<P> {
    pub fn new() -> Self {
        Self {
            attributes: BTreeMap::new(),
            calls: Vec::new(),
        }
    }

    /// Append an entry to the queue of `name`
    pub fn push_attribute(&mut self, name: &str, entry: AttributeEntry<P>) {
        self.attributes.entry(name.to_string()).or_default().push(entry);
    }

    pub fn push_call(&mut self, call: CallRecord<P>) {
        self.calls.push(call);
    }

    pub fn attributes(&self) -> &BTreeMap<String, Vec<AttributeEntry<P>>> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> &[AttributeEntry<P>] {
        self.attributes.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn calls(&self) -> &[CallRecord<P>] {
        &self.calls
    }

    /// No attribute reads and no calls were recorded
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.calls.is_empty()
    }
}

impl<P> Default for InteractionLog<P> {
    fn default() -> Self {
        Self::new()
    }
}
