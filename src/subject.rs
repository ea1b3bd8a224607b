//! Ready-made [`Subject`] adapters for functions and attribute-bearing objects

use futures::FutureExt;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::error::Fault;
use crate::traits::{Live, LiveArgs, LiveAttribute, LiveFuture, Subject};
use crate::types::Value;

type Function = Rc<dyn Fn(LiveArgs) -> Result<Live, Fault>>;
type AsyncFunction = Rc<dyn Fn(LiveArgs) -> LiveFuture<Live>>;

/// A callable dependency backed by a closure
pub struct FunctionSubject {
    name: String,
    function: Function,
}

impl FunctionSubject {
    pub fn new(
        name: impl Into<String>,
        function: impl Fn(LiveArgs) -> Result<Live, Fault> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            function: Rc::new(function),
        }
    }

    fn shared(name: &str, function: &Function) -> Self {
        Self {
            name: name.to_string(),
            function: Rc::clone(function),
        }
    }
}

impl Subject for FunctionSubject {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn invoke(&mut self, args: LiveArgs) -> Result<Live, Fault> {
        (self.function)(args)
    }
}

enum Member {
    Value(Rc<dyn Fn() -> Live>),
    Method(Function),
    AsyncMethod(AsyncFunction),
}

/// An object with named values and methods
///
/// Each read of a method yields a fresh bound-method subject, the way a
/// dynamic object hands out a new bound method per attribute access.
/// Written fields shadow members of the same name.
pub struct ObjectSubject {
    type_name: String,
    members: BTreeMap<String, Member>,
    fields: BTreeMap<String, Value>,
}

impl ObjectSubject {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            members: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }

    /// Attribute whose value is produced by `value` on every read
    pub fn with_value(mut self, name: impl Into<String>, value: impl Fn() -> Live + 'static) -> Self {
        self.members.insert(name.into(), Member::Value(Rc::new(value)));
        self
    }

    /// Plain data field
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_method(
        mut self,
        name: impl Into<String>,
        method: impl Fn(LiveArgs) -> Result<Live, Fault> + 'static,
    ) -> Self {
        self.members.insert(name.into(), Member::Method(Rc::new(method)));
        self
    }

    pub fn with_async_method(
        mut self,
        name: impl Into<String>,
        method: impl Fn(LiveArgs) -> LiveFuture<Live> + 'static,
    ) -> Self {
        self.members.insert(name.into(), Member::AsyncMethod(Rc::new(method)));
        self
    }

    /// Current value of a written field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

impl Subject for ObjectSubject {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn get_attribute(&mut self, name: &str) -> Result<LiveAttribute, Fault> {
        if let Some(value) = self.fields.get(name) {
            return Ok(LiveAttribute::Value(value.clone().lift()));
        }
        match self.members.get(name) {
            Some(Member::Value(value)) => Ok(LiveAttribute::Value(value())),
            Some(Member::Method(method)) => {
                let bound = FunctionSubject::shared(&format!("{}.{}", self.type_name, name), method);
                Ok(LiveAttribute::Value(Live::object(bound)))
            }
            Some(Member::AsyncMethod(method)) => {
                let method = Rc::clone(method);
                Ok(LiveAttribute::Async(Box::new(move |args| method(args))))
            }
            None => Err(Fault::attribute_error(format!(
                "'{}' object has no attribute '{}'",
                self.type_name, name
            ))),
        }
    }

    fn set_attribute(&mut self, name: &str, value: Value) -> Result<(), Fault> {
        self.fields.insert(name.to_string(), value);
        Ok(())
    }
}

/// Wrap a ready result as a [`LiveFuture`]
pub fn ready<T: 'static>(result: Result<T, Fault>) -> LiveFuture<T> {
    futures::future::ready(result).boxed_local()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_reads_yield_callable_subjects() {
        let mut object = ObjectSubject::new("TestClass").with_method("method1", |args| {
            Ok(Live::from(args.get(0).and_then(|v| v.as_i64()).unwrap_or_default() + 1))
        });

        let attribute = object.get_attribute("method1").unwrap();
        let mut method = match attribute {
            LiveAttribute::Value(node) => node.into_proxy().unwrap(),
            LiveAttribute::Async(_) => panic!("method1 is synchronous"),
        };

        assert_eq!(method.type_name(), "TestClass.method1");
        assert_eq!(method.invoke(LiveArgs::new().arg(1)).unwrap().as_i64(), Some(2));
    }

    #[test]
    fn test_written_fields_are_readable() {
        let mut object = ObjectSubject::new("TestClass");
        object.set_attribute("name", Value::from("x")).unwrap();

        assert_eq!(object.field("name"), Some(&Value::from("x")));
        match object.get_attribute("name").unwrap() {
            LiveAttribute::Value(node) => assert_eq!(node.as_str(), Some("x")),
            LiveAttribute::Async(_) => panic!("fields are synchronous"),
        }
    }

    #[test]
    fn test_missing_attribute_raises() {
        let mut object = ObjectSubject::new("TestClass");
        let fault = object.get_attribute("missing").err().unwrap();
        assert_eq!(fault.kind, "AttributeError");
    }

    #[test]
    fn test_plain_function_does_not_support_context_protocol() {
        let mut function = FunctionSubject::new("f", |_| Ok(Live::null()));
        assert_eq!(function.enter_context().err().unwrap().kind, "TypeError");
    }
}
