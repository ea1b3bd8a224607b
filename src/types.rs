//! Core data types for interaction recording
//!
//! Every value that crosses a proxy boundary is a [`Node`]: a closed union of
//! scalars, composites and nested proxies. The proxy type is a parameter so the
//! same shape describes live values, recorded values and replayed values.

use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crate::error::{Fault, ObjectIdError};

/// Opaque 12-byte unique identifier with a 24-digit hex canonical form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub [u8; 12]);

impl ObjectId {
    /// Create an identifier from its raw bytes
    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Raw identifier bytes
    pub fn bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for ObjectId {
    type Err = ObjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ObjectIdError::Invalid {
            value: s.to_string(),
        };
        if s.len() != 24 {
            return Err(invalid());
        }
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| invalid())?;
        Ok(Self(bytes))
    }
}

/// Blake3 digest of a canonical interaction document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub [u8; 32]);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Values that are copied as-is instead of being wrapped
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Decimal(BigDecimal),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    ZonedDateTime(DateTime<FixedOffset>),
    ObjectId(ObjectId),
}

impl Scalar {
    /// Name of the scalar kind, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "bool",
            Scalar::Int(_) => "int",
            Scalar::Float(_) => "float",
            Scalar::Text(_) => "str",
            Scalar::Decimal(_) => "Decimal",
            Scalar::Date(_) => "date",
            Scalar::DateTime(_) | Scalar::ZonedDateTime(_) => "datetime",
            Scalar::ObjectId(_) => "ObjectId",
        }
    }
}

/// A value tree whose leaves are scalars or proxies of type `P`
#[derive(Debug, Clone, PartialEq)]
pub enum Node<P> {
    Scalar(Scalar),
    List(Vec<Node<P>>),
    Tuple(Vec<Node<P>>),
    /// Unordered set; element order is kept as observed
    Set(Vec<Node<P>>),
    FrozenSet(Vec<Node<P>>),
    Map(BTreeMap<String, Node<P>>),
    Proxy(P),
}

/// Plain data: a node that can never hold a proxy
pub type Value = Node<Infallible>;

impl<P> Node<P> {
    pub fn null() -> Self {
        Node::Scalar(Scalar::Null)
    }

    /// Build a map node from key/value pairs
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Node<P>)>,
    {
        Node::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Replace every proxy leaf using `f`, keeping the structure
    pub fn map_proxy<Q, F>(self, f: &mut F) -> Node<Q>
    where
        F: FnMut(P) -> Q,
    {
        self.graft(&mut |proxy| Node::Proxy(f(proxy)))
    }

    /// Replace every proxy leaf with the subtree returned by `f`
    pub fn graft<Q, F>(self, f: &mut F) -> Node<Q>
    where
        F: FnMut(P) -> Node<Q>,
    {
        fn all<P, Q, F: FnMut(P) -> Node<Q>>(items: Vec<Node<P>>, f: &mut F) -> Vec<Node<Q>> {
            items.into_iter().map(|item| item.graft(f)).collect()
        }

        match self {
            Node::Scalar(scalar) => Node::Scalar(scalar),
            Node::List(items) => Node::List(all(items, f)),
            Node::Tuple(items) => Node::Tuple(all(items, f)),
            Node::Set(items) => Node::Set(all(items, f)),
            Node::FrozenSet(items) => Node::FrozenSet(all(items, f)),
            Node::Map(entries) => Node::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, v.graft(f)))
                    .collect(),
            ),
            Node::Proxy(proxy) => f(proxy),
        }
    }

    /// Replace every proxy leaf using `f`, stopping at the first failure
    pub fn try_map_proxy<Q, E, F>(self, f: &mut F) -> Result<Node<Q>, E>
    where
        F: FnMut(P) -> Result<Q, E>,
    {
        let mut failure = None;
        let node = self.graft(&mut |proxy| match f(proxy) {
            Ok(mapped) => Node::Proxy(mapped),
            Err(err) => {
                failure.get_or_insert(err);
                Node::null()
            }
        });
        match failure {
            Some(err) => Err(err),
            None => Ok(node),
        }
    }

    /// Copy of this node as plain data, or `None` if any leaf is a proxy
    pub fn to_value(&self) -> Option<Value> {
        fn all<P>(items: &[Node<P>]) -> Option<Vec<Value>> {
            items.iter().map(Node::to_value).collect()
        }

        Some(match self {
            Node::Scalar(scalar) => Node::Scalar(scalar.clone()),
            Node::List(items) => Node::List(all(items)?),
            Node::Tuple(items) => Node::Tuple(all(items)?),
            Node::Set(items) => Node::Set(all(items)?),
            Node::FrozenSet(items) => Node::FrozenSet(all(items)?),
            Node::Map(entries) => Node::Map(
                entries
                    .iter()
                    .map(|(k, v)| Some((k.clone(), v.to_value()?)))
                    .collect::<Option<_>>()?,
            ),
            Node::Proxy(_) => return None,
        })
    }

    pub fn as_proxy(&self) -> Option<&P> {
        match self {
            Node::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }

    pub fn into_proxy(self) -> Option<P> {
        match self {
            Node::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Node::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Node::Scalar(Scalar::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Node::Scalar(Scalar::Float(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Node::Scalar(Scalar::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Scalar(Scalar::Text(v)) => Some(v),
            _ => None,
        }
    }

    /// Look up a key of a map node
    pub fn get(&self, key: &str) -> Option<&Node<P>> {
        match self {
            Node::Map(entries) => entries.get(key),
            _ => None,
        }
    }

    /// Truth value with the usual dynamic-language rules: empty and zero are false
    pub fn is_truthy(&self) -> bool {
        match self {
            Node::Scalar(Scalar::Null) => false,
            Node::Scalar(Scalar::Bool(v)) => *v,
            Node::Scalar(Scalar::Int(v)) => *v != 0,
            Node::Scalar(Scalar::Float(v)) => *v != 0.0,
            Node::Scalar(Scalar::Text(v)) => !v.is_empty(),
            Node::Scalar(_) => true,
            Node::List(items) | Node::Tuple(items) | Node::Set(items) | Node::FrozenSet(items) => {
                !items.is_empty()
            }
            Node::Map(entries) => !entries.is_empty(),
            Node::Proxy(_) => true,
        }
    }

    /// Name of the node kind, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Node::Scalar(scalar) => scalar.type_name(),
            Node::List(_) => "list",
            Node::Tuple(_) => "tuple",
            Node::Set(_) => "set",
            Node::FrozenSet(_) => "frozenset",
            Node::Map(_) => "dict",
            Node::Proxy(_) => "proxy",
        }
    }
}

impl Value {
    /// Widen plain data into a node of any proxy type
    pub fn lift<P>(self) -> Node<P> {
        self.map_proxy(&mut |never: Infallible| match never {})
    }
}

impl<P> From<Scalar> for Node<P> {
    fn from(scalar: Scalar) -> Self {
        Node::Scalar(scalar)
    }
}

macro_rules! scalar_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl<P> From<$ty> for Node<P> {
                fn from(value: $ty) -> Self {
                    Node::Scalar(Scalar::$variant(value.into()))
                }
            }
        )*
    };
}

scalar_from! {
    bool => Bool,
    i32 => Int,
    i64 => Int,
    f64 => Float,
    String => Text,
    &str => Text,
    BigDecimal => Decimal,
    NaiveDate => Date,
    NaiveDateTime => DateTime,
    DateTime<FixedOffset> => ZonedDateTime,
    ObjectId => ObjectId,
}

impl<P> From<()> for Node<P> {
    fn from(_: ()) -> Self {
        Node::null()
    }
}

impl<P, T: Into<Node<P>>> From<Vec<T>> for Node<P> {
    fn from(items: Vec<T>) -> Self {
        Node::List(items.into_iter().map(Into::into).collect())
    }
}

/// Positional and keyword arguments of one invocation
///
/// Leaves are plain data or handles of type `P`, so a result handed out by
/// one proxied call can be passed into another.
#[derive(Debug, Clone, PartialEq)]
pub struct Args<P = Infallible> {
    pub positional: Vec<Node<P>>,
    pub keyword: BTreeMap<String, Node<P>>,
}

impl<P> Default for Args<P> {
    fn default() -> Self {
        Self {
            positional: Vec::new(),
            keyword: BTreeMap::new(),
        }
    }
}

impl<P> Args<P> {
    /// Create an empty argument list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument
    pub fn arg(mut self, value: impl Into<Node<P>>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a keyword argument
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Node<P>>) -> Self {
        self.keyword.insert(name.into(), value.into());
        self
    }

    /// Positional argument at `index`
    pub fn get(&self, index: usize) -> Option<&Node<P>> {
        self.positional.get(index)
    }

    /// Keyword argument named `name`
    pub fn kw(&self, name: &str) -> Option<&Node<P>> {
        self.keyword.get(name)
    }

    /// Positional argument at `index`, falling back to the keyword `name`
    pub fn param(&self, index: usize, name: &str) -> Option<&Node<P>> {
        self.get(index).or_else(|| self.kw(name))
    }

    /// Replace every handle with the subtree returned by `f`
    pub fn graft<Q, F>(self, f: &mut F) -> Args<Q>
    where
        F: FnMut(P) -> Node<Q>,
    {
        Args {
            positional: self.positional.into_iter().map(|node| node.graft(f)).collect(),
            keyword: self
                .keyword
                .into_iter()
                .map(|(name, node)| (name, node.graft(f)))
                .collect(),
        }
    }

    pub fn map_proxy<Q, F>(self, f: &mut F) -> Args<Q>
    where
        F: FnMut(P) -> Q,
    {
        self.graft(&mut |proxy| Node::Proxy(f(proxy)))
    }

    /// Replace every handle using `f`, stopping at the first failure
    pub fn try_map_proxy<Q, E, F>(self, f: &mut F) -> Result<Args<Q>, E>
    where
        F: FnMut(P) -> Result<Q, E>,
    {
        Ok(Args {
            positional: self
                .positional
                .into_iter()
                .map(|node| node.try_map_proxy(f))
                .collect::<Result<_, _>>()?,
            keyword: self
                .keyword
                .into_iter()
                .map(|(name, node)| Ok((name, node.try_map_proxy(f)?)))
                .collect::<Result<_, E>>()?,
        })
    }

    /// Number of positional and keyword arguments
    pub fn len(&self) -> usize {
        self.positional.len() + self.keyword.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }
}

/// What one recorded interaction produced
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<P> {
    Returned(Node<P>),
    Raised(Fault),
    /// End of an asynchronous iteration
    Exhausted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_round_trips_through_text() {
        let id = ObjectId::from_bytes([0x65, 0x4f, 0x1c, 0, 1, 2, 3, 4, 5, 6, 7, 0xff]);
        let text = id.to_string();

        assert_eq!(text, "654f1c0001020304050607ff");
        assert_eq!(text.parse::<ObjectId>().unwrap(), id);
    }

    #[test]
    fn test_object_id_rejects_bad_text() {
        assert!("abc".parse::<ObjectId>().is_err());
        assert!("zz4f1c0001020304050607ff".parse::<ObjectId>().is_err());
    }

    #[test]
    fn test_to_value_stops_at_proxies() {
        let data: Node<u8> = Node::map([("a", Node::from(1)), ("b", Node::from("x"))]);
        assert!(data.to_value().is_some());

        let with_proxy: Node<u8> = Node::List(vec![Node::from(1), Node::Proxy(7)]);
        assert!(with_proxy.to_value().is_none());
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::null().is_truthy());
        assert!(!Value::from(false).is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from(true).is_truthy());
        assert!(Value::from(vec![1]).is_truthy());
    }

    #[test]
    fn test_args_param_falls_back_to_keyword() {
        let args = Args::new().kwarg("param", "value");
        assert_eq!(args.param(0, "param"), Some(&Value::from("value")));
        assert_eq!(args.param(1, "other"), None);
    }

    #[test]
    fn test_args_handles_are_converted_in_place() {
        let args: Args<u8> = Args::new().arg(1).arg(Node::Proxy(7u8)).kwarg("h", Node::Proxy(9u8));

        let widened = args.clone().map_proxy(&mut |h| u16::from(h));
        assert_eq!(widened.get(1), Some(&Node::Proxy(7u16)));
        assert_eq!(widened.kw("h"), Some(&Node::Proxy(9u16)));
        assert_eq!(widened.len(), 3);

        let failed: Result<Args<u8>, u8> = args.try_map_proxy(&mut |h| if h < 8 { Ok(h) } else { Err(h) });
        assert_eq!(failed, Err(9));
    }
}
