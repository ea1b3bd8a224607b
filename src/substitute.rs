//! Tagged variant over the two proxy implementations

use futures::FutureExt;

use crate::error::{Fault, ProxyError};
use crate::recording::RecordingProxy;
use crate::replay::ReplaySubstitute;
use crate::traits::{Attribute, Proxy, ProxyFuture};
use crate::types::{Args, Node, Value};

/// What gets bound in place of a dependency: a recorder or a replayer
#[derive(Debug, Clone, PartialEq)]
pub enum Substitute {
    Recording(RecordingProxy),
    Replay(ReplaySubstitute),
}

impl Substitute {
    pub fn is_recording(&self) -> bool {
        matches!(self, Substitute::Recording(_))
    }

    pub fn as_recording(&self) -> Option<&RecordingProxy> {
        match self {
            Substitute::Recording(proxy) => Some(proxy),
            Substitute::Replay(_) => None,
        }
    }

    pub fn as_replay(&self) -> Option<&ReplaySubstitute> {
        match self {
            Substitute::Recording(_) => None,
            Substitute::Replay(substitute) => Some(substitute),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Substitute::Recording(_) => "recording proxy",
            Substitute::Replay(_) => "replay substitute",
        }
    }

    /// The recording proxy, or an error naming the variant found instead
    pub fn into_recording(self) -> Result<RecordingProxy, ProxyError> {
        match self {
            Substitute::Recording(proxy) => Ok(proxy),
            other => Err(ProxyError::MixedHandles {
                expected: "recording proxy",
                found: other.kind(),
            }),
        }
    }

    /// The replay substitute, or an error naming the variant found instead
    pub fn into_replay(self) -> Result<ReplaySubstitute, ProxyError> {
        match self {
            Substitute::Replay(substitute) => Ok(substitute),
            other => Err(ProxyError::MixedHandles {
                expected: "replay substitute",
                found: other.kind(),
            }),
        }
    }
}

impl From<RecordingProxy> for Substitute {
    fn from(proxy: RecordingProxy) -> Self {
        Substitute::Recording(proxy)
    }
}

impl From<ReplaySubstitute> for Substitute {
    fn from(substitute: ReplaySubstitute) -> Self {
        Substitute::Replay(substitute)
    }
}

fn lift<P>(result: Result<Node<P>, ProxyError>, wrap: fn(P) -> Substitute) -> Result<Node<Substitute>, ProxyError> {
    result.map(|node| node.map_proxy(&mut { wrap }))
}

fn lift_future<P: 'static>(pending: ProxyFuture<Node<P>>, wrap: fn(P) -> Substitute) -> ProxyFuture<Node<Substitute>> {
    pending.map(move |result| lift(result, wrap)).boxed_local()
}

impl Proxy for Substitute {
    fn get_attribute(&self, name: &str) -> Result<Attribute<Self>, ProxyError> {
        match self {
            Substitute::Recording(proxy) => Ok(proxy
                .get_attribute(name)?
                .map_proxy(Substitute::Recording, Substitute::into_recording)),
            Substitute::Replay(substitute) => Ok(substitute
                .get_attribute(name)?
                .map_proxy(Substitute::Replay, Substitute::into_replay)),
        }
    }

    fn set_attribute(&self, name: &str, value: Value) -> Result<(), ProxyError> {
        match self {
            Substitute::Recording(proxy) => proxy.set_attribute(name, value),
            Substitute::Replay(substitute) => substitute.set_attribute(name, value),
        }
    }

    fn invoke(&self, args: Args<Self>) -> Result<Node<Self>, ProxyError> {
        match self {
            Substitute::Recording(proxy) => {
                let args = args.try_map_proxy(&mut Substitute::into_recording)?;
                lift(proxy.invoke(args), Substitute::Recording)
            }
            Substitute::Replay(substitute) => {
                let args = args.try_map_proxy(&mut Substitute::into_replay)?;
                lift(substitute.invoke(args), Substitute::Replay)
            }
        }
    }

    fn enter_context(&self) -> Result<Node<Self>, ProxyError> {
        match self {
            Substitute::Recording(proxy) => lift(proxy.enter_context(), Substitute::Recording),
            Substitute::Replay(substitute) => lift(substitute.enter_context(), Substitute::Replay),
        }
    }

    fn exit_context(&self, fault: Option<&Fault>) -> Result<bool, ProxyError> {
        match self {
            Substitute::Recording(proxy) => proxy.exit_context(fault),
            Substitute::Replay(substitute) => substitute.exit_context(fault),
        }
    }

    fn enter_async_context(&self) -> ProxyFuture<Node<Self>> {
        match self {
            Substitute::Recording(proxy) => lift_future(proxy.enter_async_context(), Substitute::Recording),
            Substitute::Replay(substitute) => lift_future(substitute.enter_async_context(), Substitute::Replay),
        }
    }

    fn exit_async_context(&self, fault: Option<Fault>) -> ProxyFuture<bool> {
        match self {
            Substitute::Recording(proxy) => proxy.exit_async_context(fault),
            Substitute::Replay(substitute) => substitute.exit_async_context(fault),
        }
    }

    fn async_iter(&self) -> Result<Node<Self>, ProxyError> {
        match self {
            Substitute::Recording(proxy) => lift(proxy.async_iter(), Substitute::Recording),
            Substitute::Replay(substitute) => lift(substitute.async_iter(), Substitute::Replay),
        }
    }

    fn async_next(&self) -> ProxyFuture<Option<Node<Self>>> {
        match self {
            Substitute::Recording(proxy) => proxy
                .async_next()
                .map(|step| step.map(|item| item.map(|node| node.map_proxy(&mut Substitute::Recording))))
                .boxed_local(),
            Substitute::Replay(substitute) => substitute
                .async_next()
                .map(|step| step.map(|item| item.map(|node| node.map_proxy(&mut Substitute::Replay))))
                .boxed_local(),
        }
    }
}
