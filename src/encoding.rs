//! Canonical encoding of interaction trees into tagged documents
//!
//! A recorded proxy becomes a self-describing `serde_json::Value`. Every
//! non-primitive leaf carries a `__type__` tag; plain mappings, lists and
//! primitives are written as-is. Decoding reverses the walk and produces a
//! [`ReplaySubstitute`] tree.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Number, Value as Json};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::{DecodeError, EncodeError, Fault};
use crate::interaction::{AttributeEntry, CallRecord};
use crate::recording::RecordingProxy;
use crate::replay::{RecordedAccesses, ReplaySubstitute};
use crate::types::{Args, Node, ObjectId, Outcome, Scalar, Value};

/// Proxies whose encoding is in progress, innermost last
type Active = RefCell<Vec<usize>>;

pub const TYPE_KEY: &str = "__type__";
pub const VALUE_KEY: &str = "value";
pub const ATTRIBUTES_KEY: &str = "recorded_attribute_accesses";
pub const CALLS_KEY: &str = "recorded_calls";
pub const REPEAT_KEY: &str = "__repeat__";

const NAIVE_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Wire-level `__type__` tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    RecordingMock,
    Decimal,
    DateTime,
    Date,
    ObjectId,
    Tuple,
    FrozenSet,
    Set,
    AsyncValue,
    Exception,
    StopAsyncIteration,
}

impl TypeTag {
    pub const ALL: [TypeTag; 11] = [
        TypeTag::RecordingMock,
        TypeTag::Decimal,
        TypeTag::DateTime,
        TypeTag::Date,
        TypeTag::ObjectId,
        TypeTag::Tuple,
        TypeTag::FrozenSet,
        TypeTag::Set,
        TypeTag::AsyncValue,
        TypeTag::Exception,
        TypeTag::StopAsyncIteration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::RecordingMock => "RecordingMock",
            TypeTag::Decimal => "Decimal",
            TypeTag::DateTime => "datetime",
            TypeTag::Date => "date",
            TypeTag::ObjectId => "ObjectId",
            TypeTag::Tuple => "tuple",
            TypeTag::FrozenSet => "frozenset",
            TypeTag::Set => "set",
            TypeTag::AsyncValue => "async_value",
            TypeTag::Exception => "exception",
            TypeTag::StopAsyncIteration => "StopAsyncIteration",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|candidate| candidate.as_str() == tag)
    }
}

fn tagged(tag: TypeTag, value: Json) -> Json {
    let mut object = Map::new();
    object.insert(TYPE_KEY.to_string(), Json::String(tag.as_str().to_string()));
    object.insert(VALUE_KEY.to_string(), value);
    Json::Object(object)
}

fn bare_tag(tag: TypeTag) -> Json {
    let mut object = Map::new();
    object.insert(TYPE_KEY.to_string(), Json::String(tag.as_str().to_string()));
    Json::Object(object)
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "list",
        Json::Object(_) => "mapping",
    }
}

/// A queue of identical entries collapses to a single repeat marker
fn compact(entries: Vec<Json>) -> Json {
    match entries.first() {
        Some(first) if entries.iter().all(|entry| entry == first) => {
            let mut object = Map::new();
            object.insert(REPEAT_KEY.to_string(), first.clone());
            Json::Object(object)
        }
        _ => Json::Array(entries),
    }
}

type ProxyEncoder<'a, P> = &'a dyn Fn(&P) -> Result<Json, EncodeError>;
type ProxyDecoder<'a, P> = &'a dyn Fn(&Json) -> Result<P, DecodeError>;

/// Converts between recorded proxies and tagged documents
#[derive(Debug, Clone, Copy, Default)]
pub struct InteractionCodec;

impl InteractionCodec {
    pub fn new() -> Self {
        Self
    }

    /// Encode everything recorded on `proxy`
    ///
    /// Returns `None` when nothing was recorded, which callers treat as
    /// "no artifact". Nested proxies with no interactions still encode as
    /// a bare `RecordingMock`.
    pub fn encode(&self, proxy: &RecordingProxy) -> Result<Option<Json>, EncodeError> {
        if self.log_is_empty(proxy)? {
            return Ok(None);
        }
        self.encode_proxy(proxy, &Active::default()).map(Some)
    }

    /// Encode a plain value (no proxies)
    pub fn encode_value(&self, value: &Value) -> Result<Json, EncodeError> {
        self.encode_node(value, &|never| match *never {})
    }

    /// Rebuild a replay substitute from an encoded document
    ///
    /// A `null` root stands for a dependency with nothing recorded.
    pub fn decode(&self, document: &Json) -> Result<ReplaySubstitute, DecodeError> {
        if document.is_null() {
            return Ok(ReplaySubstitute::empty());
        }
        let substitute = self.decode_proxy(document)?;
        tracing::debug!(
            attributes = substitute.recorded_attributes().len(),
            calls = substitute.recorded_call_count(),
            "decoded interaction document"
        );
        Ok(substitute)
    }

    /// Decode a plain value; `RecordingMock` tags are rejected
    pub fn decode_value(&self, json: &Json) -> Result<Value, DecodeError> {
        self.decode_node(json, &|_| Err(DecodeError::ProxyInValue))
    }

    fn log_is_empty(&self, proxy: &RecordingProxy) -> Result<bool, EncodeError> {
        let log = proxy.try_log().ok_or_else(|| EncodeError::ProxyBusy {
            type_name: proxy.type_name().to_string(),
        })?;
        Ok(log.is_empty())
    }

    fn encode_proxy(&self, proxy: &RecordingProxy, active: &Active) -> Result<Json, EncodeError> {
        if active.borrow().contains(&proxy.id()) {
            return Err(EncodeError::CyclicRecording {
                type_name: proxy.type_name().to_string(),
            });
        }
        active.borrow_mut().push(proxy.id());
        let encoded = self.encode_log(proxy, active);
        active.borrow_mut().pop();
        encoded
    }

    fn encode_log(&self, proxy: &RecordingProxy, active: &Active) -> Result<Json, EncodeError> {
        let log = proxy.try_log().ok_or_else(|| EncodeError::ProxyBusy {
            type_name: proxy.type_name().to_string(),
        })?;

        let mut object = Map::new();
        object.insert(
            TYPE_KEY.to_string(),
            Json::String(TypeTag::RecordingMock.as_str().to_string()),
        );

        if !log.attributes().is_empty() {
            let mut attributes = Map::new();
            for (name, entries) in log.attributes() {
                let encoded = entries
                    .iter()
                    .map(|entry| self.encode_entry(entry, active))
                    .collect::<Result<Vec<_>, _>>()?;
                attributes.insert(name.clone(), compact(encoded));
            }
            object.insert(ATTRIBUTES_KEY.to_string(), Json::Object(attributes));
        }

        if !log.calls().is_empty() {
            let calls = log
                .calls()
                .iter()
                .map(|call| self.encode_call(call, active))
                .collect::<Result<Vec<_>, _>>()?;
            object.insert(CALLS_KEY.to_string(), Json::Array(calls));
        }

        Ok(Json::Object(object))
    }

    fn encode_entry(&self, entry: &AttributeEntry<RecordingProxy>, active: &Active) -> Result<Json, EncodeError> {
        let encoded = self.encode_outcome(&entry.outcome, active)?;
        if entry.asynchronous {
            Ok(tagged(TypeTag::AsyncValue, encoded))
        } else {
            Ok(encoded)
        }
    }

    fn encode_outcome(&self, outcome: &Outcome<RecordingProxy>, active: &Active) -> Result<Json, EncodeError> {
        match outcome {
            Outcome::Returned(node) => self.encode_recorded(node, active),
            Outcome::Raised(fault) => {
                let mut object = Map::new();
                object.insert("kind".to_string(), Json::String(fault.kind.clone()));
                object.insert("message".to_string(), Json::String(fault.message.clone()));
                Ok(tagged(TypeTag::Exception, Json::Object(object)))
            }
            Outcome::Exhausted => Ok(bare_tag(TypeTag::StopAsyncIteration)),
        }
    }

    /// `tuple(tuple(tuple(args), kwargs), result)`
    fn encode_call(&self, call: &CallRecord<RecordingProxy>, active: &Active) -> Result<Json, EncodeError> {
        let positional = call
            .args
            .positional
            .iter()
            .map(|value| self.encode_recorded(value, active))
            .collect::<Result<Vec<_>, _>>()?;
        let mut keyword = Map::new();
        for (name, value) in &call.args.keyword {
            keyword.insert(name.clone(), self.encode_recorded(value, active)?);
        }

        let invocation = tagged(
            TypeTag::Tuple,
            Json::Array(vec![
                tagged(TypeTag::Tuple, Json::Array(positional)),
                Json::Object(keyword),
            ]),
        );
        Ok(tagged(
            TypeTag::Tuple,
            Json::Array(vec![invocation, self.encode_recorded(&call.result, active)?]),
        ))
    }

    fn encode_recorded(&self, node: &Node<RecordingProxy>, active: &Active) -> Result<Json, EncodeError> {
        self.encode_node(node, &|proxy| self.encode_proxy(proxy, active))
    }

    fn encode_node<P>(&self, node: &Node<P>, proxy: ProxyEncoder<'_, P>) -> Result<Json, EncodeError> {
        match node {
            Node::Scalar(scalar) => encode_scalar(scalar),
            Node::List(items) => Ok(Json::Array(self.encode_items(items, proxy)?)),
            Node::Tuple(items) => Ok(tagged(TypeTag::Tuple, Json::Array(self.encode_items(items, proxy)?))),
            Node::Set(items) => Ok(tagged(TypeTag::Set, Json::Array(self.encode_items(items, proxy)?))),
            Node::FrozenSet(items) => Ok(tagged(
                TypeTag::FrozenSet,
                Json::Array(self.encode_items(items, proxy)?),
            )),
            Node::Map(entries) => {
                if entries.contains_key(TYPE_KEY) {
                    return Err(EncodeError::ReservedKey {
                        key: TYPE_KEY.to_string(),
                    });
                }
                let mut object = Map::new();
                for (key, value) in entries {
                    object.insert(key.clone(), self.encode_node(value, proxy)?);
                }
                Ok(Json::Object(object))
            }
            Node::Proxy(inner) => proxy(inner),
        }
    }

    fn encode_items<P>(&self, items: &[Node<P>], proxy: ProxyEncoder<'_, P>) -> Result<Vec<Json>, EncodeError> {
        items.iter().map(|item| self.encode_node(item, proxy)).collect()
    }

    fn decode_proxy(&self, json: &Json) -> Result<ReplaySubstitute, DecodeError> {
        let object = json.as_object().ok_or(DecodeError::NotAMapping {
            context: "RecordingMock",
            found: json_kind(json),
        })?;
        match object.get(TYPE_KEY) {
            None => return Err(DecodeError::MissingTypeTag { context: "RecordingMock" }),
            Some(Json::String(tag)) if tag == TypeTag::RecordingMock.as_str() => {}
            Some(other) => {
                return Err(DecodeError::UnexpectedTag {
                    expected: TypeTag::RecordingMock.as_str(),
                    found: other.to_string(),
                })
            }
        }

        let mut attributes = BTreeMap::new();
        match object.get(ATTRIBUTES_KEY) {
            None | Some(Json::Null) => {}
            Some(Json::Object(recorded)) => {
                for (name, accesses) in recorded {
                    attributes.insert(name.clone(), self.decode_accesses(name, accesses)?);
                }
            }
            Some(other) => {
                return Err(DecodeError::NotAMapping {
                    context: ATTRIBUTES_KEY,
                    found: json_kind(other),
                })
            }
        }

        let calls = match object.get(CALLS_KEY) {
            None | Some(Json::Null) => Vec::new(),
            Some(Json::Array(recorded)) => recorded
                .iter()
                .map(|call| self.decode_call(call))
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => {
                return Err(DecodeError::NotAList {
                    context: CALLS_KEY,
                    found: json_kind(other),
                })
            }
        };

        Ok(ReplaySubstitute::new(attributes, calls))
    }

    fn decode_accesses(&self, name: &str, json: &Json) -> Result<RecordedAccesses, DecodeError> {
        match json {
            Json::Array(entries) => {
                let entries = entries
                    .iter()
                    .map(|entry| self.decode_entry(entry))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(RecordedAccesses::queue(entries))
            }
            Json::Object(object) => match object.get(REPEAT_KEY) {
                Some(entry) => Ok(RecordedAccesses::Repeat(self.decode_entry(entry)?)),
                None => Err(DecodeError::MissingRepeat { name: name.to_string() }),
            },
            _ => Err(DecodeError::MissingRepeat { name: name.to_string() }),
        }
    }

    fn decode_entry(&self, json: &Json) -> Result<AttributeEntry<ReplaySubstitute>, DecodeError> {
        if tag_of(json) == Some(TypeTag::AsyncValue.as_str()) {
            let inner = json.get(VALUE_KEY).ok_or(DecodeError::MissingValue {
                tag: TypeTag::AsyncValue.as_str(),
            })?;
            return Ok(AttributeEntry::asynchronous(self.decode_outcome(inner)?));
        }
        Ok(AttributeEntry {
            outcome: self.decode_outcome(json)?,
            asynchronous: false,
        })
    }

    fn decode_outcome(&self, json: &Json) -> Result<Outcome<ReplaySubstitute>, DecodeError> {
        match tag_of(json).and_then(TypeTag::parse) {
            Some(TypeTag::Exception) => Ok(Outcome::Raised(decode_fault(json.get(VALUE_KEY))?)),
            Some(TypeTag::StopAsyncIteration) => Ok(Outcome::Exhausted),
            _ => Ok(Outcome::Returned(self.decode_recorded(json)?)),
        }
    }

    fn decode_call(&self, json: &Json) -> Result<CallRecord<ReplaySubstitute>, DecodeError> {
        let [invocation, result] = call_pair(json, "call record")?;
        let [positional, keyword] = call_pair(invocation, "call arguments")?;

        let positional = tuple_items(positional, "positional arguments")?
            .iter()
            .map(|value| self.decode_recorded(value))
            .collect::<Result<Vec<_>, _>>()?;
        let keyword = match keyword {
            Json::Object(entries) => entries
                .iter()
                .map(|(name, value)| Ok((name.clone(), self.decode_recorded(value)?)))
                .collect::<Result<BTreeMap<_, _>, DecodeError>>()?,
            other => {
                return Err(DecodeError::MalformedCall {
                    reason: format!("keyword arguments must be a mapping, got {}", json_kind(other)),
                })
            }
        };

        Ok(CallRecord {
            args: Args { positional, keyword },
            result: self.decode_recorded(result)?,
        })
    }

    fn decode_recorded(&self, json: &Json) -> Result<Node<ReplaySubstitute>, DecodeError> {
        self.decode_node(json, &|proxy| self.decode_proxy(proxy))
    }

    fn decode_node<P>(&self, json: &Json, proxy: ProxyDecoder<'_, P>) -> Result<Node<P>, DecodeError> {
        match json {
            Json::Null => Ok(Node::Scalar(Scalar::Null)),
            Json::Bool(flag) => Ok(Node::Scalar(Scalar::Bool(*flag))),
            Json::Number(number) => decode_number(number).map(Node::Scalar),
            Json::String(text) => Ok(Node::Scalar(Scalar::Text(text.clone()))),
            Json::Array(items) => Ok(Node::List(self.decode_items(items, proxy)?)),
            Json::Object(object) => {
                let tag = match object.get(TYPE_KEY) {
                    None => {
                        let mut entries = BTreeMap::new();
                        for (key, value) in object {
                            entries.insert(key.clone(), self.decode_node(value, proxy)?);
                        }
                        return Ok(Node::Map(entries));
                    }
                    Some(Json::String(tag)) => TypeTag::parse(tag).ok_or_else(|| DecodeError::UnknownTag {
                        tag: tag.clone(),
                    })?,
                    Some(other) => return Err(DecodeError::UnknownTag { tag: other.to_string() }),
                };

                match tag {
                    TypeTag::RecordingMock => Ok(Node::Proxy(proxy(json)?)),
                    TypeTag::Decimal => {
                        let text = literal_text(object, tag)?;
                        BigDecimal::from_str(text)
                            .map(|decimal| Node::Scalar(Scalar::Decimal(decimal)))
                            .map_err(|err| invalid_literal(tag, text, err))
                    }
                    TypeTag::DateTime => {
                        let text = literal_text(object, tag)?;
                        decode_datetime(text).map(Node::Scalar)
                    }
                    TypeTag::Date => {
                        let text = literal_text(object, tag)?;
                        NaiveDate::parse_from_str(text, DATE_FORMAT)
                            .map(|date| Node::Scalar(Scalar::Date(date)))
                            .map_err(|err| invalid_literal(tag, text, err))
                    }
                    TypeTag::ObjectId => {
                        let text = literal_text(object, tag)?;
                        ObjectId::from_str(text)
                            .map(|id| Node::Scalar(Scalar::ObjectId(id)))
                            .map_err(|err| invalid_literal(tag, text, err))
                    }
                    TypeTag::Tuple => Ok(Node::Tuple(self.decode_container(object, tag, proxy)?)),
                    TypeTag::Set => Ok(Node::Set(self.decode_container(object, tag, proxy)?)),
                    TypeTag::FrozenSet => Ok(Node::FrozenSet(self.decode_container(object, tag, proxy)?)),
                    TypeTag::AsyncValue | TypeTag::Exception | TypeTag::StopAsyncIteration => {
                        Err(DecodeError::MisplacedTag { tag: tag.as_str() })
                    }
                }
            }
        }
    }

    fn decode_container<P>(
        &self,
        object: &Map<String, Json>,
        tag: TypeTag,
        proxy: ProxyDecoder<'_, P>,
    ) -> Result<Vec<Node<P>>, DecodeError> {
        match object.get(VALUE_KEY) {
            Some(Json::Array(items)) => self.decode_items(items, proxy),
            other => Err(DecodeError::NotAList {
                context: tag.as_str(),
                found: other.map(json_kind).unwrap_or("nothing"),
            }),
        }
    }

    fn decode_items<P>(&self, items: &[Json], proxy: ProxyDecoder<'_, P>) -> Result<Vec<Node<P>>, DecodeError> {
        items.iter().map(|item| self.decode_node(item, proxy)).collect()
    }
}

fn encode_scalar(scalar: &Scalar) -> Result<Json, EncodeError> {
    Ok(match scalar {
        Scalar::Null => Json::Null,
        Scalar::Bool(flag) => Json::Bool(*flag),
        Scalar::Int(number) => Json::from(*number),
        Scalar::Float(number) => Number::from_f64(*number)
            .map(Json::Number)
            .ok_or_else(|| EncodeError::UnsupportedValue {
                type_name: scalar.type_name(),
                reason: format!("{number} has no JSON representation"),
            })?,
        Scalar::Text(text) => Json::String(text.clone()),
        Scalar::Decimal(decimal) => tagged(TypeTag::Decimal, Json::String(decimal.to_string())),
        Scalar::Date(date) => tagged(TypeTag::Date, Json::String(date.format(DATE_FORMAT).to_string())),
        Scalar::DateTime(datetime) => tagged(
            TypeTag::DateTime,
            Json::String(datetime.format(NAIVE_DATETIME_FORMAT).to_string()),
        ),
        Scalar::ZonedDateTime(datetime) => tagged(TypeTag::DateTime, Json::String(datetime.to_rfc3339())),
        Scalar::ObjectId(id) => tagged(TypeTag::ObjectId, Json::String(id.to_string())),
    })
}

fn decode_number(number: &Number) -> Result<Scalar, DecodeError> {
    if let Some(integer) = number.as_i64() {
        return Ok(Scalar::Int(integer));
    }
    if number.is_f64() {
        if let Some(float) = number.as_f64() {
            return Ok(Scalar::Float(float));
        }
    }
    Err(DecodeError::NumberOutOfRange {
        value: number.to_string(),
    })
}

/// Offset-aware text first, then naive
fn decode_datetime(text: &str) -> Result<Scalar, DecodeError> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Ok(Scalar::ZonedDateTime(datetime));
    }
    NaiveDateTime::parse_from_str(text, NAIVE_DATETIME_FORMAT)
        .map(Scalar::DateTime)
        .map_err(|err| invalid_literal(TypeTag::DateTime, text, err))
}

fn decode_fault(json: Option<&Json>) -> Result<Fault, DecodeError> {
    let object = match json {
        Some(Json::Object(object)) => object,
        other => {
            return Err(DecodeError::NotAMapping {
                context: "exception",
                found: other.map(json_kind).unwrap_or("nothing"),
            })
        }
    };
    let field = |name: &str| object.get(name).and_then(Json::as_str).unwrap_or_default().to_string();
    Ok(Fault::new(field("kind"), field("message")))
}

fn tag_of(json: &Json) -> Option<&str> {
    json.get(TYPE_KEY).and_then(Json::as_str)
}

fn literal_text<'a>(object: &'a Map<String, Json>, tag: TypeTag) -> Result<&'a str, DecodeError> {
    match object.get(VALUE_KEY) {
        Some(Json::String(text)) => Ok(text.as_str()),
        other => Err(DecodeError::InvalidLiteral {
            tag: tag.as_str(),
            value: other.map(Json::to_string).unwrap_or_default(),
            reason: "expected a string".to_string(),
        }),
    }
}

fn invalid_literal(tag: TypeTag, text: &str, err: impl std::fmt::Display) -> DecodeError {
    DecodeError::InvalidLiteral {
        tag: tag.as_str(),
        value: text.to_string(),
        reason: err.to_string(),
    }
}

fn tuple_items<'a>(json: &'a Json, context: &str) -> Result<&'a [Json], DecodeError> {
    if tag_of(json) != Some(TypeTag::Tuple.as_str()) {
        return Err(DecodeError::MalformedCall {
            reason: format!("{context} must be a tagged tuple"),
        });
    }
    match json.get(VALUE_KEY) {
        Some(Json::Array(items)) => Ok(items),
        _ => Err(DecodeError::MalformedCall {
            reason: format!("{context} tuple has no value list"),
        }),
    }
}

fn call_pair<'a>(json: &'a Json, context: &str) -> Result<[&'a Json; 2], DecodeError> {
    match tuple_items(json, context)? {
        [first, second] => Ok([first, second]),
        items => Err(DecodeError::MalformedCall {
            reason: format!("{context} must have 2 items, found {}", items.len()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{Live, Proxy};
    use crate::subject::ObjectSubject;
    use serde_json::json;

    fn recorded_point() -> RecordingProxy {
        let proxy = RecordingProxy::new(ObjectSubject::new("Point").with_value("x", || Live::from(3)));
        proxy.attribute("x").unwrap();
        proxy.attribute("x").unwrap();
        proxy
    }

    #[test]
    fn test_identical_reads_are_compacted() {
        let document = InteractionCodec::new().encode(&recorded_point()).unwrap().unwrap();
        assert_eq!(
            document,
            json!({
                "__type__": "RecordingMock",
                "recorded_attribute_accesses": {"x": {"__repeat__": 3}}
            })
        );
    }

    #[test]
    fn test_empty_recording_encodes_to_nothing() {
        let proxy = RecordingProxy::new(ObjectSubject::new("Idle"));
        assert_eq!(InteractionCodec::new().encode(&proxy).unwrap(), None);
    }

    #[test]
    fn test_type_tags_round_trip_through_their_names() {
        for tag in TypeTag::ALL {
            assert_eq!(TypeTag::parse(tag.as_str()), Some(tag));
        }
        assert_eq!(TypeTag::parse("complex"), None);
    }

    #[test]
    fn test_scalar_leaves_are_tagged() {
        let codec = InteractionCodec::new();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let value = Value::List(vec![
            Value::from(BigDecimal::from_str("1.50").unwrap()),
            Value::from(date),
            Value::from(date.and_hms_opt(12, 30, 0).unwrap()),
            Value::Tuple(vec![Value::from(1), Value::from("a")]),
        ]);

        assert_eq!(
            codec.encode_value(&value).unwrap(),
            json!([
                {"__type__": "Decimal", "value": "1.50"},
                {"__type__": "date", "value": "2024-03-01"},
                {"__type__": "datetime", "value": "2024-03-01T12:30:00"},
                {"__type__": "tuple", "value": [1, "a"]}
            ])
        );
    }

    #[test]
    fn test_non_finite_float_is_rejected() {
        let err = InteractionCodec::new().encode_value(&Value::from(f64::NAN)).unwrap_err();
        assert!(matches!(err, EncodeError::UnsupportedValue { type_name: "float", .. }));
    }

    #[test]
    fn test_reserved_key_is_rejected() {
        let value = Value::map([("__type__", Value::from("sneaky"))]);
        let err = InteractionCodec::new().encode_value(&value).unwrap_err();
        assert!(matches!(err, EncodeError::ReservedKey { .. }));
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let err = InteractionCodec::new()
            .decode_value(&json!({"__type__": "complex", "value": "1+2j"}))
            .unwrap_err();
        assert!(matches!(err, DecodeError::UnknownTag { tag } if tag == "complex"));
    }

    #[test]
    fn test_entry_markers_are_not_values() {
        let err = InteractionCodec::new()
            .decode_value(&json!([{"__type__": "StopAsyncIteration"}]))
            .unwrap_err();
        assert!(matches!(err, DecodeError::MisplacedTag { tag: "StopAsyncIteration" }));
    }

    #[test]
    fn test_proxy_inside_plain_value_is_rejected() {
        let err = InteractionCodec::new()
            .decode_value(&json!({"__type__": "RecordingMock"}))
            .unwrap_err();
        assert!(matches!(err, DecodeError::ProxyInValue));
    }

    #[test]
    fn test_async_entry_without_value_is_rejected() {
        let document = json!({
            "__type__": "RecordingMock",
            "recorded_attribute_accesses": {"recv": [{"__type__": "async_value"}]}
        });

        let err = InteractionCodec::new().decode(&document).unwrap_err();

        assert!(matches!(err, DecodeError::MissingValue { tag: "async_value" }));
    }

    #[test]
    fn test_handle_passed_to_itself_is_a_cycle() {
        let proxy = RecordingProxy::new(
            ObjectSubject::new("Node").with_method("link", |_| Ok(Live::null())),
        );
        proxy
            .call_method("link", Args::new().arg(Node::Proxy(proxy.clone())))
            .unwrap();

        let err = InteractionCodec::new().encode(&proxy).unwrap_err();

        assert!(matches!(err, EncodeError::CyclicRecording { type_name } if type_name == "Node"));
    }

    #[test]
    fn test_large_integers_are_rejected() {
        let err = InteractionCodec::new()
            .decode_value(&json!(u64::MAX))
            .unwrap_err();
        assert!(matches!(err, DecodeError::NumberOutOfRange { .. }));
    }

    #[test]
    fn test_offset_datetime_keeps_offset() {
        let value = InteractionCodec::new()
            .decode_value(&json!({"__type__": "datetime", "value": "2024-01-02T03:04:05+02:00"}))
            .unwrap();
        match value {
            Node::Scalar(Scalar::ZonedDateTime(datetime)) => {
                assert_eq!(datetime.offset().local_minus_utc(), 2 * 3600)
            }
            other => panic!("expected an offset datetime, got {other:?}"),
        }
    }

    #[test]
    fn test_null_document_decodes_to_empty_substitute() {
        assert!(InteractionCodec::new().decode(&Json::Null).unwrap().is_empty());
    }
}
