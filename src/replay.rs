//! Replay substitute: answers interactions from a decoded recording

use futures::future::{self, FutureExt};
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use crate::error::{Fault, ProxyError};
use crate::interaction::{AttributeEntry, CallRecord, ProtocolSlot};
use crate::traits::{AsyncCall, Attribute, Proxy, ProxyFuture};
use crate::types::{Args, Node, Outcome, Value};

/// Recorded values for one attribute name
#[derive(Debug, Clone)]
pub enum RecordedAccesses {
    /// Every recorded value was identical; it is returned on every read
    Repeat(AttributeEntry<ReplaySubstitute>),
    /// Values are handed out in recorded order, one per read
    Queue {
        entries: VecDeque<AttributeEntry<ReplaySubstitute>>,
        recorded: usize,
    },
}

impl RecordedAccesses {
    pub fn queue(entries: impl IntoIterator<Item = AttributeEntry<ReplaySubstitute>>) -> Self {
        let entries: VecDeque<_> = entries.into_iter().collect();
        let recorded = entries.len();
        RecordedAccesses::Queue { entries, recorded }
    }

    /// Independent copy of the unread entries
    fn fork(&self) -> Self {
        match self {
            RecordedAccesses::Repeat(entry) => RecordedAccesses::Repeat(fork_entry(entry)),
            RecordedAccesses::Queue { entries, recorded } => RecordedAccesses::Queue {
                entries: entries.iter().map(fork_entry).collect(),
                recorded: *recorded,
            },
        }
    }

    /// Remaining reads, or `None` when the value repeats indefinitely
    pub fn remaining(&self) -> Option<usize> {
        match self {
            RecordedAccesses::Repeat(_) => None,
            RecordedAccesses::Queue { entries, .. } => Some(entries.len()),
        }
    }
}

#[derive(Debug, Default)]
struct ReplayState {
    attributes: BTreeMap<String, RecordedAccesses>,
    calls: Vec<CallRecord<ReplaySubstitute>>,
    call_index: usize,
}

enum Pop {
    Entry(AttributeEntry<ReplaySubstitute>),
    NotRecorded,
    Exhausted { recorded: usize },
}

/// Stands in for a dependency using only its recorded interactions
///
/// Queues drain strictly in recorded order per attribute name, per call
/// position and per protocol slot. Arguments given at replay time are never
/// compared with the recorded ones. Clones share the same queues; a repeated
/// entry hands every read its own [`fork`](ReplaySubstitute::fork) of the
/// substitutes it contains.
#[derive(Clone, Default)]
pub struct ReplaySubstitute {
    state: Rc<RefCell<ReplayState>>,
}

impl ReplaySubstitute {
    pub fn new(
        attributes: BTreeMap<String, RecordedAccesses>,
        calls: Vec<CallRecord<ReplaySubstitute>>,
    ) -> Self {
        Self {
            state: Rc::new(RefCell::new(ReplayState {
                attributes,
                calls,
                call_index: 0,
            })),
        }
    }

    /// Deep copy with independent queues, nested substitutes included
    ///
    /// The copy starts from the current position: entries already read and
    /// calls already replayed stay consumed.
    pub fn fork(&self) -> Self {
        let state = self.state.borrow();
        Self {
            state: Rc::new(RefCell::new(ReplayState {
                attributes: state
                    .attributes
                    .iter()
                    .map(|(name, accesses)| (name.clone(), accesses.fork()))
                    .collect(),
                calls: state
                    .calls
                    .iter()
                    .map(|call| CallRecord {
                        args: call.args.clone().map_proxy(&mut |handle: ReplaySubstitute| handle.fork()),
                        result: fork_node(&call.result),
                    })
                    .collect(),
                call_index: state.call_index,
            })),
        }
    }

    /// Substitute for a dependency with which nothing was recorded
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> ReplaySubstituteBuilder {
        ReplaySubstituteBuilder::new()
    }

    /// Names with recorded accesses, protocol slots included
    pub fn recorded_attributes(&self) -> Vec<String> {
        self.state.borrow().attributes.keys().cloned().collect()
    }

    /// Reads left for `name`; `None` if unrecorded, `Some(None)` if repeating
    pub fn remaining(&self, name: &str) -> Option<Option<usize>> {
        self.state.borrow().attributes.get(name).map(RecordedAccesses::remaining)
    }

    pub fn recorded_call_count(&self) -> usize {
        self.state.borrow().calls.len()
    }

    pub fn calls_remaining(&self) -> usize {
        let state = self.state.borrow();
        state.calls.len().saturating_sub(state.call_index)
    }

    /// Arguments of the recorded calls, in call order
    pub fn recorded_call_args(&self) -> Vec<Args<ReplaySubstitute>> {
        self.state.borrow().calls.iter().map(|call| call.args.clone()).collect()
    }

    /// Nothing at all was recorded for this substitute
    pub fn is_empty(&self) -> bool {
        let state = self.state.borrow();
        state.attributes.is_empty() && state.calls.is_empty()
    }

    fn pop(&self, name: &str) -> Pop {
        let mut state = self.state.borrow_mut();
        match state.attributes.get_mut(name) {
            None => Pop::NotRecorded,
            Some(RecordedAccesses::Repeat(entry)) => Pop::Entry(fork_entry(entry)),
            Some(RecordedAccesses::Queue { entries, recorded }) => match entries.pop_front() {
                Some(entry) => Pop::Entry(entry),
                None => Pop::Exhausted { recorded: *recorded },
            },
        }
    }

    fn next_entry(&self, name: &str) -> Result<AttributeEntry<ReplaySubstitute>, ProxyError> {
        match self.pop(name) {
            Pop::Entry(entry) => {
                tracing::trace!(attribute = name, asynchronous = entry.asynchronous, "replayed attribute access");
                Ok(entry)
            }
            Pop::NotRecorded => Err(ProxyError::AttributeNotRecorded {
                name: name.to_string(),
            }),
            Pop::Exhausted { recorded } => {
                tracing::debug!(attribute = name, recorded, "replayed attribute queue is exhausted");
                Err(ProxyError::AttributeExhausted {
                    name: name.to_string(),
                    recorded,
                })
            }
        }
    }

    fn next_slot_value(&self, slot: ProtocolSlot) -> Result<Node<ReplaySubstitute>, ProxyError> {
        let entry = self.next_entry(slot.as_str())?;
        outcome_into_result(entry.outcome)
    }

    /// Suppress flag for an exit slot; absent or drained entries do not suppress
    fn exit_flag(&self, slot: ProtocolSlot) -> Result<bool, ProxyError> {
        match self.pop(slot.as_str()) {
            Pop::Entry(entry) => Ok(outcome_into_result(entry.outcome)?.is_truthy()),
            Pop::NotRecorded | Pop::Exhausted { .. } => {
                tracing::debug!(slot = slot.as_str(), "no recorded exit result, not suppressing");
                Ok(false)
            }
        }
    }
}

fn fork_node(node: &Node<ReplaySubstitute>) -> Node<ReplaySubstitute> {
    node.clone().map_proxy(&mut |substitute: ReplaySubstitute| substitute.fork())
}

fn fork_entry(entry: &AttributeEntry<ReplaySubstitute>) -> AttributeEntry<ReplaySubstitute> {
    let outcome = match &entry.outcome {
        Outcome::Returned(node) => Outcome::Returned(fork_node(node)),
        other => other.clone(),
    };
    AttributeEntry {
        outcome,
        asynchronous: entry.asynchronous,
    }
}

fn outcome_into_result(outcome: Outcome<ReplaySubstitute>) -> Result<Node<ReplaySubstitute>, ProxyError> {
    match outcome {
        Outcome::Returned(node) => Ok(node),
        Outcome::Raised(fault) => Err(ProxyError::Raised(fault)),
        Outcome::Exhausted => Err(ProxyError::Raised(Fault::stop_async_iteration())),
    }
}

fn replayed_async_call(name: &str, outcome: Outcome<ReplaySubstitute>) -> AsyncCall<ReplaySubstitute> {
    AsyncCall::new(name, move |_args| future::ready(outcome_into_result(outcome)).boxed_local())
}

impl Proxy for ReplaySubstitute {
    fn get_attribute(&self, name: &str) -> Result<Attribute<Self>, ProxyError> {
        let entry = self.next_entry(name)?;
        if entry.asynchronous {
            return Ok(Attribute::Async(replayed_async_call(name, entry.outcome)));
        }
        outcome_into_result(entry.outcome).map(Attribute::Value)
    }

    fn set_attribute(&self, name: &str, _value: Value) -> Result<(), ProxyError> {
        tracing::debug!(attribute = name, "ignoring attribute write on replay substitute");
        Ok(())
    }

    fn invoke(&self, args: Args<Self>) -> Result<Node<Self>, ProxyError> {
        let mut state = self.state.borrow_mut();
        let recorded = state.calls.len();
        if state.call_index >= recorded {
            return Err(ProxyError::CallsExhausted { recorded });
        }
        let result = state.calls[state.call_index].result.clone();
        state.call_index += 1;
        tracing::trace!(
            call_index = state.call_index - 1,
            positional = args.positional.len(),
            keyword = args.keyword.len(),
            "replayed call"
        );
        Ok(result)
    }

    fn enter_context(&self) -> Result<Node<Self>, ProxyError> {
        self.next_slot_value(ProtocolSlot::Enter)
    }

    fn exit_context(&self, _fault: Option<&Fault>) -> Result<bool, ProxyError> {
        self.exit_flag(ProtocolSlot::Exit)
    }

    fn enter_async_context(&self) -> ProxyFuture<Node<Self>> {
        future::ready(self.next_slot_value(ProtocolSlot::AsyncEnter)).boxed_local()
    }

    fn exit_async_context(&self, _fault: Option<Fault>) -> ProxyFuture<bool> {
        future::ready(self.exit_flag(ProtocolSlot::AsyncExit)).boxed_local()
    }

    fn async_iter(&self) -> Result<Node<Self>, ProxyError> {
        self.next_slot_value(ProtocolSlot::AsyncIter)
    }

    fn async_next(&self) -> ProxyFuture<Option<Node<Self>>> {
        let step = match self.pop(ProtocolSlot::AsyncNext.as_str()) {
            Pop::NotRecorded => Ok(None),
            Pop::Exhausted { recorded } => Err(ProxyError::AttributeExhausted {
                name: ProtocolSlot::AsyncNext.as_str().to_string(),
                recorded,
            }),
            Pop::Entry(entry) => match entry.outcome {
                Outcome::Returned(node) => Ok(Some(node)),
                Outcome::Exhausted => Ok(None),
                Outcome::Raised(fault) => Err(ProxyError::Raised(fault)),
            },
        };
        future::ready(step).boxed_local()
    }
}

impl PartialEq for ReplaySubstitute {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl fmt::Debug for ReplaySubstitute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("ReplaySubstitute");
        if let Ok(state) = self.state.try_borrow() {
            out.field("attributes", &state.attributes.keys().collect::<Vec<_>>())
                .field("calls", &state.calls.len())
                .field("call_index", &state.call_index);
        }
        out.finish()
    }
}

/// Builder for substitutes assembled by hand rather than decoded
#[derive(Debug, Default)]
pub struct ReplaySubstituteBuilder {
    attributes: BTreeMap<String, RecordedAccesses>,
    calls: Vec<CallRecord<ReplaySubstitute>>,
}

impl ReplaySubstituteBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values returned by successive reads of `name`
    pub fn queue<I, T>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Node<ReplaySubstitute>>,
    {
        let entries = values.into_iter().map(|value| AttributeEntry::value(value.into()));
        self.attributes.insert(name.into(), RecordedAccesses::queue(entries));
        self
    }

    /// Value returned by every read of `name`
    pub fn repeat(mut self, name: impl Into<String>, value: impl Into<Node<ReplaySubstitute>>) -> Self {
        self.attributes
            .insert(name.into(), RecordedAccesses::Repeat(AttributeEntry::value(value.into())));
        self
    }

    /// Outcomes of successive awaited calls of the asynchronous attribute `name`
    pub fn async_queue<I>(mut self, name: impl Into<String>, outcomes: I) -> Self
    where
        I: IntoIterator<Item = Outcome<ReplaySubstitute>>,
    {
        let entries = outcomes.into_iter().map(AttributeEntry::asynchronous);
        self.attributes.insert(name.into(), RecordedAccesses::queue(entries));
        self
    }

    pub fn accesses(mut self, name: impl Into<String>, accesses: RecordedAccesses) -> Self {
        self.attributes.insert(name.into(), accesses);
        self
    }

    /// Append a recorded call
    pub fn call(mut self, args: Args<ReplaySubstitute>, result: impl Into<Node<ReplaySubstitute>>) -> Self {
        self.calls.push(CallRecord {
            args,
            result: result.into(),
        });
        self
    }

    pub fn build(self) -> ReplaySubstitute {
        ReplaySubstitute::new(self.attributes, self.calls)
    }
}
