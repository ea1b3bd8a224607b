//! Recording proxy: forwards to a live dependency and logs what it observed

use futures::future::{self, FutureExt};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::classifier::Classifier;
use crate::error::{Fault, ProxyError};
use crate::interaction::{AttributeEntry, CallRecord, InteractionLog, ProtocolSlot};
use crate::traits::{
    AsyncCall, AsyncMethod, Attribute, Live, LiveArgs, LiveAttribute, LiveFuture, Proxy, ProxyFuture, Subject,
};
use crate::types::{Args, Node, Outcome, Value};

struct RecordingInner {
    type_name: String,
    subject: RefCell<Box<dyn Subject>>,
    classifier: Classifier,
    log: RefCell<InteractionLog<RecordingProxy>>,
}

/// Wraps one live dependency and records every interaction with it
///
/// Results are passed through the [`Classifier`] before being logged and
/// returned, so nested dependencies come back as nested recording proxies.
/// Clones share the same dependency and the same log.
#[derive(Clone)]
pub struct RecordingProxy {
    inner: Rc<RecordingInner>,
}

impl RecordingProxy {
    /// Wrap a dependency using the base concrete set
    pub fn new(subject: impl Subject + 'static) -> Self {
        Self::with_classifier(Box::new(subject), Classifier::new())
    }

    /// Wrap a dependency using a specific classifier for its results
    pub fn with_classifier(subject: Box<dyn Subject>, classifier: Classifier) -> Self {
        Self {
            inner: Rc::new(RecordingInner {
                type_name: subject.type_name().to_string(),
                subject: RefCell::new(subject),
                classifier,
                log: RefCell::new(InteractionLog::new()),
            }),
        }
    }

    /// Type name of the wrapped dependency
    pub fn type_name(&self) -> &str {
        &self.inner.type_name
    }

    pub fn classifier(&self) -> &Classifier {
        &self.inner.classifier
    }

    /// Interactions recorded so far
    ///
    /// # Panics
    /// Panics if called while an interaction is being appended.
    pub fn log(&self) -> Ref<'_, InteractionLog<RecordingProxy>> {
        self.inner.log.borrow()
    }

    /// Identity shared by all clones of this proxy
    pub(crate) fn id(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }

    pub(crate) fn try_log(&self) -> Option<Ref<'_, InteractionLog<RecordingProxy>>> {
        self.inner.log.try_borrow().ok()
    }

    /// No interaction has been recorded on this proxy
    pub fn is_empty(&self) -> bool {
        self.try_log().map(|log| log.is_empty()).unwrap_or(false)
    }

    /// The wrapped dependency itself, for slots that expect the plain object
    ///
    /// Nothing done through the returned handle is recorded.
    pub fn bound(&self) -> Result<RefMut<'_, Box<dyn Subject>>, ProxyError> {
        self.subject()
    }

    fn subject(&self) -> Result<RefMut<'_, Box<dyn Subject>>, ProxyError> {
        self.inner
            .subject
            .try_borrow_mut()
            .map_err(|_| self.reentrant())
    }

    fn reentrant(&self) -> ProxyError {
        ProxyError::Reentrant {
            type_name: self.inner.type_name.clone(),
        }
    }

    fn record(&self, apply: impl FnOnce(&mut InteractionLog<RecordingProxy>)) -> Result<(), ProxyError> {
        let mut log = self.inner.log.try_borrow_mut().map_err(|_| self.reentrant())?;
        apply(&mut log);
        Ok(())
    }

    fn record_attribute(&self, name: &str, entry: AttributeEntry<RecordingProxy>) -> Result<(), ProxyError> {
        tracing::trace!(
            type_name = %self.inner.type_name,
            attribute = name,
            asynchronous = entry.asynchronous,
            "recorded attribute access"
        );
        self.record(|log| log.push_attribute(name, entry))
    }

    fn classify(&self, value: Live) -> Node<RecordingProxy> {
        self.inner.classifier.classify(value)
    }

    fn async_method(&self, name: &str, method: AsyncMethod) -> AsyncCall<RecordingProxy> {
        let proxy = self.clone();
        let attribute = name.to_string();
        AsyncCall::new(name, move |args: Args<RecordingProxy>| {
            complete_async_call(proxy, attribute, method(live_args(args))).boxed_local()
        })
    }
}

fn live(node: Node<RecordingProxy>) -> Live {
    node.map_proxy(&mut |proxy| Box::new(proxy) as Box<dyn Subject>)
}

fn live_args(args: Args<RecordingProxy>) -> LiveArgs {
    args.map_proxy(&mut |proxy| Box::new(proxy) as Box<dyn Subject>)
}

async fn complete_async_call(
    proxy: RecordingProxy,
    name: String,
    pending: LiveFuture<Live>,
) -> Result<Node<RecordingProxy>, ProxyError> {
    match pending.await {
        Ok(value) => {
            let node = proxy.classify(value);
            proxy.record_attribute(&name, AttributeEntry::asynchronous(Outcome::Returned(node.clone())))?;
            Ok(node)
        }
        Err(fault) => {
            proxy.record_attribute(&name, AttributeEntry::asynchronous(Outcome::Raised(fault.clone())))?;
            Err(ProxyError::Raised(fault))
        }
    }
}

async fn complete_async_enter(
    proxy: RecordingProxy,
    pending: LiveFuture<Live>,
) -> Result<Node<RecordingProxy>, ProxyError> {
    let node = proxy.classify(pending.await?);
    proxy.record_attribute(ProtocolSlot::AsyncEnter.as_str(), AttributeEntry::value(node.clone()))?;
    Ok(node)
}

async fn complete_async_exit(proxy: RecordingProxy, pending: LiveFuture<bool>) -> Result<bool, ProxyError> {
    let suppress = pending.await?;
    proxy.record_attribute(ProtocolSlot::AsyncExit.as_str(), AttributeEntry::value(Node::from(suppress)))?;
    Ok(suppress)
}

async fn complete_async_next(
    proxy: RecordingProxy,
    pending: LiveFuture<Option<Live>>,
) -> Result<Option<Node<RecordingProxy>>, ProxyError> {
    let slot = ProtocolSlot::AsyncNext.as_str();
    match pending.await? {
        Some(value) => {
            let node = proxy.classify(value);
            proxy.record_attribute(slot, AttributeEntry::asynchronous(Outcome::Returned(node.clone())))?;
            Ok(Some(node))
        }
        None => {
            proxy.record_attribute(slot, AttributeEntry::asynchronous(Outcome::Exhausted))?;
            Ok(None)
        }
    }
}

impl Proxy for RecordingProxy {
    fn get_attribute(&self, name: &str) -> Result<Attribute<Self>, ProxyError> {
        let attribute = self.subject()?.get_attribute(name)?;
        match attribute {
            LiveAttribute::Value(value) => {
                let node = self.classify(value);
                self.record_attribute(name, AttributeEntry::value(node.clone()))?;
                Ok(Attribute::Value(node))
            }
            LiveAttribute::Async(method) => Ok(Attribute::Async(self.async_method(name, method))),
        }
    }

    fn set_attribute(&self, name: &str, value: Value) -> Result<(), ProxyError> {
        self.subject()?.set_attribute(name, value)?;
        Ok(())
    }

    fn invoke(&self, args: Args<Self>) -> Result<Node<Self>, ProxyError> {
        let value = self.subject()?.invoke(live_args(args.clone()))?;
        let result = self.classify(value);
        tracing::trace!(
            type_name = %self.inner.type_name,
            positional = args.positional.len(),
            keyword = args.keyword.len(),
            "recorded call"
        );
        self.record(|log| {
            log.push_call(CallRecord {
                args,
                result: result.clone(),
            })
        })?;
        Ok(result)
    }

    fn enter_context(&self) -> Result<Node<Self>, ProxyError> {
        let value = self.subject()?.enter_context()?;
        let node = self.classify(value);
        self.record_attribute(ProtocolSlot::Enter.as_str(), AttributeEntry::value(node.clone()))?;
        Ok(node)
    }

    fn exit_context(&self, fault: Option<&Fault>) -> Result<bool, ProxyError> {
        let suppress = self.subject()?.exit_context(fault)?;
        self.record_attribute(ProtocolSlot::Exit.as_str(), AttributeEntry::value(Node::from(suppress)))?;
        Ok(suppress)
    }

    fn enter_async_context(&self) -> ProxyFuture<Node<Self>> {
        let pending = match self.subject() {
            Ok(mut subject) => subject.enter_async_context(),
            Err(err) => return future::ready(Err(err)).boxed_local(),
        };
        complete_async_enter(self.clone(), pending).boxed_local()
    }

    fn exit_async_context(&self, fault: Option<Fault>) -> ProxyFuture<bool> {
        let pending = match self.subject() {
            Ok(mut subject) => subject.exit_async_context(fault),
            Err(err) => return future::ready(Err(err)).boxed_local(),
        };
        complete_async_exit(self.clone(), pending).boxed_local()
    }

    fn async_iter(&self) -> Result<Node<Self>, ProxyError> {
        let value = self.subject()?.async_iter()?;
        let node = self.classify(value);
        self.record_attribute(ProtocolSlot::AsyncIter.as_str(), AttributeEntry::value(node.clone()))?;
        Ok(node)
    }

    fn async_next(&self) -> ProxyFuture<Option<Node<Self>>> {
        let pending = match self.subject() {
            Ok(mut subject) => subject.async_next(),
            Err(err) => return future::ready(Err(err)).boxed_local(),
        };
        complete_async_next(self.clone(), pending).boxed_local()
    }
}

/// A recording proxy passed to a live dependency as an argument
///
/// Whatever the dependency does with the handle is recorded on it, exactly as
/// if the calling code had done it.
impl Subject for RecordingProxy {
    fn type_name(&self) -> &str {
        &self.inner.type_name
    }

    fn get_attribute(&mut self, name: &str) -> Result<LiveAttribute, Fault> {
        match Proxy::get_attribute(&*self, name).map_err(ProxyError::into_fault)? {
            Attribute::Value(node) => Ok(LiveAttribute::Value(live(node))),
            Attribute::Async(call) => {
                let classifier = self.inner.classifier.clone();
                Ok(LiveAttribute::Async(Box::new(move |args: LiveArgs| {
                    let pending = call.call(classifier.classify_args(args));
                    async move { pending.await.map(live).map_err(ProxyError::into_fault) }.boxed_local()
                })))
            }
        }
    }

    fn set_attribute(&mut self, name: &str, value: Value) -> Result<(), Fault> {
        Proxy::set_attribute(&*self, name, value).map_err(ProxyError::into_fault)
    }

    fn invoke(&mut self, args: LiveArgs) -> Result<Live, Fault> {
        let args = self.inner.classifier.classify_args(args);
        Proxy::invoke(&*self, args).map(live).map_err(ProxyError::into_fault)
    }

    fn enter_context(&mut self) -> Result<Live, Fault> {
        Proxy::enter_context(&*self).map(live).map_err(ProxyError::into_fault)
    }

    fn exit_context(&mut self, fault: Option<&Fault>) -> Result<bool, Fault> {
        Proxy::exit_context(&*self, fault).map_err(ProxyError::into_fault)
    }

    fn enter_async_context(&mut self) -> LiveFuture<Live> {
        Proxy::enter_async_context(&*self)
            .map(|entered| entered.map(live).map_err(ProxyError::into_fault))
            .boxed_local()
    }

    fn exit_async_context(&mut self, fault: Option<Fault>) -> LiveFuture<bool> {
        Proxy::exit_async_context(&*self, fault)
            .map(|suppress| suppress.map_err(ProxyError::into_fault))
            .boxed_local()
    }

    fn async_iter(&mut self) -> Result<Live, Fault> {
        Proxy::async_iter(&*self).map(live).map_err(ProxyError::into_fault)
    }

    fn async_next(&mut self) -> LiveFuture<Option<Live>> {
        Proxy::async_next(&*self)
            .map(|step| step.map(|item| item.map(live)).map_err(ProxyError::into_fault))
            .boxed_local()
    }

    fn as_recording(&self) -> Option<RecordingProxy> {
        Some(self.clone())
    }
}

impl PartialEq for RecordingProxy {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for RecordingProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("RecordingProxy");
        out.field("type_name", &self.inner.type_name);
        if let Some(log) = self.try_log() {
            out.field("attributes", &log.attributes().keys().collect::<Vec<_>>())
                .field("calls", &log.calls().len());
        }
        out.finish()
    }
}
