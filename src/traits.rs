//! Core traits: the live dependency surface and the proxy surface

use futures::future::{self, LocalBoxFuture};
use futures::FutureExt;
use std::fmt;

use crate::error::{Fault, ProxyError};
use crate::recording::RecordingProxy;
use crate::types::{Args, Node, Value};

/// A live value: plain data with real dependencies at the leaves
pub type Live = Node<Box<dyn Subject>>;

/// Arguments as a live dependency receives them
pub type LiveArgs = Args<Box<dyn Subject>>;

/// Future produced by an asynchronous dependency operation
pub type LiveFuture<T> = LocalBoxFuture<'static, Result<T, Fault>>;

/// An asynchronous method handed out by an attribute read
pub type AsyncMethod = Box<dyn FnOnce(LiveArgs) -> LiveFuture<Live>>;

/// Result of reading an attribute on a live dependency
pub enum LiveAttribute {
    Value(Live),
    /// The attribute is an asynchronous operation that still has to be called and awaited
    Async(AsyncMethod),
}

impl From<Live> for LiveAttribute {
    fn from(value: Live) -> Self {
        LiveAttribute::Value(value)
    }
}

/// Trait for live dependencies that a recording proxy can wrap
///
/// Every protocol has a default that raises, so a dependency only implements
/// what it actually supports. Asynchronous operations must return futures that
/// own their state (`'static`), since the proxy does not stay borrowed while
/// they run.
pub trait Subject {
    /// Name of the dependency type, used for logging and concrete-type checks
    fn type_name(&self) -> &str;

    fn get_attribute(&mut self, name: &str) -> Result<LiveAttribute, Fault> {
        Err(Fault::attribute_error(format!(
            "'{}' object has no attribute '{}'",
            self.type_name(),
            name
        )))
    }

    fn set_attribute(&mut self, name: &str, _value: Value) -> Result<(), Fault> {
        Err(Fault::attribute_error(format!(
            "'{}' object attribute '{}' is read-only",
            self.type_name(),
            name
        )))
    }

    fn invoke(&mut self, _args: LiveArgs) -> Result<Live, Fault> {
        Err(Fault::type_error(format!(
            "'{}' object is not callable",
            self.type_name()
        )))
    }

    fn enter_context(&mut self) -> Result<Live, Fault> {
        Err(self.unsupported("the context manager protocol"))
    }

    /// Returns whether the pending fault (if any) is suppressed
    fn exit_context(&mut self, _fault: Option<&Fault>) -> Result<bool, Fault> {
        Err(self.unsupported("the context manager protocol"))
    }

    fn enter_async_context(&mut self) -> LiveFuture<Live> {
        future::ready(Err(self.unsupported("the asynchronous context manager protocol"))).boxed_local()
    }

    fn exit_async_context(&mut self, _fault: Option<Fault>) -> LiveFuture<bool> {
        future::ready(Err(self.unsupported("the asynchronous context manager protocol"))).boxed_local()
    }

    fn async_iter(&mut self) -> Result<Live, Fault> {
        Err(self.unsupported("asynchronous iteration"))
    }

    /// Next item of an asynchronous iteration; `None` once exhausted
    fn async_next(&mut self) -> LiveFuture<Option<Live>> {
        future::ready(Err(self.unsupported("asynchronous iteration"))).boxed_local()
    }

    /// Plain-data form of this dependency, for types registered as concrete
    fn snapshot(&self) -> Option<Value> {
        None
    }

    /// The recording proxy behind this subject, when a handle is passed back in
    #[doc(hidden)]
    fn as_recording(&self) -> Option<RecordingProxy> {
        None
    }

    #[doc(hidden)]
    fn unsupported(&self, protocol: &str) -> Fault {
        Fault::type_error(format!(
            "'{}' object does not support {}",
            self.type_name(),
            protocol
        ))
    }
}

impl fmt::Debug for dyn Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subject")
            .field("type_name", &self.type_name())
            .finish()
    }
}

impl Live {
    /// Wrap a dependency as a live leaf
    pub fn object(subject: impl Subject + 'static) -> Self {
        Node::Proxy(Box::new(subject))
    }
}

/// Future produced by a proxy's asynchronous operations
pub type ProxyFuture<T> = LocalBoxFuture<'static, Result<T, ProxyError>>;

/// An asynchronous attribute that has been read but not yet called
pub struct AsyncCall<P> {
    name: String,
    op: Box<dyn FnOnce(Args<P>) -> ProxyFuture<Node<P>>>,
}

impl<P: 'static> AsyncCall<P> {
    pub fn new(
        name: impl Into<String>,
        op: impl FnOnce(Args<P>) -> ProxyFuture<Node<P>> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            op: Box::new(op),
        }
    }

    /// Attribute name this call was read from
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Perform the call; the outcome is recorded or replayed once awaited
    pub fn call(self, args: Args<P>) -> ProxyFuture<Node<P>> {
        (self.op)(args)
    }

    /// Convert the proxies of the eventual result with `wrap`, and the
    /// handles among the arguments back with `unwrap`
    pub fn map_proxy<Q: 'static>(self, wrap: fn(P) -> Q, unwrap: fn(Q) -> Result<P, ProxyError>) -> AsyncCall<Q> {
        let op = self.op;
        AsyncCall {
            name: self.name,
            op: Box::new(move |args: Args<Q>| match args.try_map_proxy(&mut { unwrap }) {
                Ok(args) => {
                    let pending = op(args);
                    async move { pending.await.map(|node| node.map_proxy(&mut { wrap })) }.boxed_local()
                }
                Err(err) => future::ready(Err(err)).boxed_local(),
            }),
        }
    }
}

impl<P> fmt::Debug for AsyncCall<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncCall").field("name", &self.name).finish()
    }
}

/// Result of reading an attribute through a proxy
#[derive(Debug)]
pub enum Attribute<P> {
    Value(Node<P>),
    Async(AsyncCall<P>),
}

impl<P: 'static> Attribute<P> {
    /// The plain value, failing if the attribute is asynchronous
    pub fn into_value(self) -> Result<Node<P>, ProxyError> {
        match self {
            Attribute::Value(node) => Ok(node),
            Attribute::Async(call) => Err(ProxyError::AsyncAttribute {
                name: call.name,
            }),
        }
    }

    pub fn map_proxy<Q: 'static>(self, wrap: fn(P) -> Q, unwrap: fn(Q) -> Result<P, ProxyError>) -> Attribute<Q> {
        match self {
            Attribute::Value(node) => Attribute::Value(node.map_proxy(&mut { wrap })),
            Attribute::Async(call) => Attribute::Async(call.map_proxy(wrap, unwrap)),
        }
    }
}

/// Common surface of recording proxies and replay substitutes
///
/// Calling code written against this trait cannot tell which variant it holds.
pub trait Proxy: Clone + Sized + 'static {
    fn get_attribute(&self, name: &str) -> Result<Attribute<Self>, ProxyError>;

    fn set_attribute(&self, name: &str, value: Value) -> Result<(), ProxyError>;

    fn invoke(&self, args: Args<Self>) -> Result<Node<Self>, ProxyError>;

    fn enter_context(&self) -> Result<Node<Self>, ProxyError>;

    fn exit_context(&self, fault: Option<&Fault>) -> Result<bool, ProxyError>;

    fn enter_async_context(&self) -> ProxyFuture<Node<Self>>;

    fn exit_async_context(&self, fault: Option<Fault>) -> ProxyFuture<bool>;

    fn async_iter(&self) -> Result<Node<Self>, ProxyError>;

    fn async_next(&self) -> ProxyFuture<Option<Node<Self>>>;

    /// Read a plain (non-asynchronous) attribute
    fn attribute(&self, name: &str) -> Result<Node<Self>, ProxyError> {
        self.get_attribute(name)?.into_value()
    }

    /// Read the attribute `name` and invoke it
    fn call_method(&self, name: &str, args: Args<Self>) -> Result<Node<Self>, ProxyError> {
        match self.attribute(name)? {
            Node::Proxy(method) => method.invoke(args),
            other => Err(ProxyError::NotCallable {
                name: name.to_string(),
                found: other.type_name(),
            }),
        }
    }

    /// Read the asynchronous attribute `name`, call it and await the result
    fn call_async_method(&self, name: &str, args: Args<Self>) -> ProxyFuture<Node<Self>> {
        match self.get_attribute(name) {
            Ok(Attribute::Async(call)) => call.call(args),
            Ok(Attribute::Value(other)) => future::ready(Err(ProxyError::NotCallable {
                name: name.to_string(),
                found: other.type_name(),
            }))
            .boxed_local(),
            Err(err) => future::ready(Err(err)).boxed_local(),
        }
    }
}
