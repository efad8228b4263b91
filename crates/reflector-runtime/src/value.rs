// crates/reflector-runtime/src/value.rs
//
// Opaque values passed through the uniform dispatch calling convention, and
// the operand-stack slots generated code works with.

use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::types::{PrimitiveType, well_known};

/// A heap object: a class name plus mutable named fields.
#[derive(Debug)]
pub struct Instance {
    class: Arc<str>,
    fields: RefCell<FxHashMap<String, Value>>,
}

impl Instance {
    pub fn new(class: impl AsRef<str>) -> Self {
        Self {
            class: Arc::from(class.as_ref()),
            fields: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn get_field(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    pub fn set_field(&self, name: impl Into<String>, value: Value) {
        self.fields.borrow_mut().insert(name.into(), value);
    }
}

pub type ObjectRef = Rc<Instance>;

/// The opaque (boxed) representation. Primitive variants are the boxed
/// wrappers, not raw primitives; see [`Primitive`] for the latter.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Byte(i8),
    Char(char),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(Rc<str>),
    Array(Rc<[Value]>),
    Object(ObjectRef),
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(items.into_iter().collect())
    }

    pub fn empty_array() -> Self {
        Value::Array(Rc::from(Vec::new()))
    }

    pub fn object(instance: Instance) -> Self {
        Value::Object(Rc::new(instance))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the class this value is an instance of; `None` for null.
    pub fn runtime_class(&self) -> Option<&str> {
        let name = match self {
            Value::Null => return None,
            Value::Boolean(_) => well_known::BOOLEAN,
            Value::Byte(_) => well_known::BYTE,
            Value::Char(_) => well_known::CHARACTER,
            Value::Short(_) => well_known::SHORT,
            Value::Int(_) => well_known::INTEGER,
            Value::Long(_) => well_known::LONG,
            Value::Float(_) => well_known::FLOAT,
            Value::Double(_) => well_known::DOUBLE,
            Value::Str(_) => well_known::STRING,
            Value::Array(_) => well_known::OBJECT_ARRAY,
            Value::Object(instance) => instance.class(),
        };
        Some(name)
    }

    /// Runtime class name for messages, `null` for null.
    pub fn describe_class(&self) -> String {
        self.runtime_class().unwrap_or("null").to_string()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// The boxed primitive inside this value, if it is a primitive wrapper.
    pub fn as_boxed_primitive(&self) -> Option<Primitive> {
        let p = match self {
            Value::Boolean(v) => Primitive::Boolean(*v),
            Value::Byte(v) => Primitive::Byte(*v),
            Value::Char(v) => Primitive::Char(*v),
            Value::Short(v) => Primitive::Short(*v),
            Value::Int(v) => Primitive::Int(*v),
            Value::Long(v) => Primitive::Long(*v),
            Value::Float(v) => Primitive::Float(*v),
            Value::Double(v) => Primitive::Double(*v),
            _ => return None,
        };
        Some(p)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            // Objects compare by identity.
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "{}", v),
            Value::Short(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Str(s) => f.write_str(s),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Object(obj) => write!(f, "{}@{:p}", obj.class(), Rc::as_ptr(obj)),
        }
    }
}

/// An unboxed primitive value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
    Boolean(bool),
    Byte(i8),
    Char(char),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl Primitive {
    pub fn ty(&self) -> PrimitiveType {
        match self {
            Primitive::Boolean(_) => PrimitiveType::Boolean,
            Primitive::Byte(_) => PrimitiveType::Byte,
            Primitive::Char(_) => PrimitiveType::Char,
            Primitive::Short(_) => PrimitiveType::Short,
            Primitive::Int(_) => PrimitiveType::Int,
            Primitive::Long(_) => PrimitiveType::Long,
            Primitive::Float(_) => PrimitiveType::Float,
            Primitive::Double(_) => PrimitiveType::Double,
        }
    }

    pub fn boxed(self) -> Value {
        match self {
            Primitive::Boolean(v) => Value::Boolean(v),
            Primitive::Byte(v) => Value::Byte(v),
            Primitive::Char(v) => Value::Char(v),
            Primitive::Short(v) => Value::Short(v),
            Primitive::Int(v) => Value::Int(v),
            Primitive::Long(v) => Value::Long(v),
            Primitive::Float(v) => Value::Float(v),
            Primitive::Double(v) => Value::Double(v),
        }
    }
}

/// One operand-stack or local-variable slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Prim(Primitive),
    Ref(Value),
}

impl Slot {
    pub fn null() -> Self {
        Slot::Ref(Value::Null)
    }

    pub fn int(v: i32) -> Self {
        Slot::Prim(Primitive::Int(v))
    }

    pub fn as_primitive(&self) -> Option<Primitive> {
        match self {
            Slot::Prim(p) => Some(*p),
            Slot::Ref(_) => None,
        }
    }

    pub fn as_ref_value(&self) -> Option<&Value> {
        match self {
            Slot::Ref(v) => Some(v),
            Slot::Prim(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Slot::Prim(Primitive::Int(v)) => Some(*v),
            _ => None,
        }
    }
}

impl From<Primitive> for Slot {
    fn from(p: Primitive) -> Self {
        Slot::Prim(p)
    }
}

impl From<Value> for Slot {
    fn from(v: Value) -> Self {
        Slot::Ref(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_classes() {
        assert_eq!(Value::Int(1).runtime_class(), Some("Integer"));
        assert_eq!(Value::str("x").runtime_class(), Some("String"));
        assert_eq!(Value::empty_array().runtime_class(), Some("Object[]"));
        assert_eq!(Value::Null.runtime_class(), None);
        let point = Value::object(Instance::new("Point"));
        assert_eq!(point.runtime_class(), Some("Point"));
    }

    #[test]
    fn objects_compare_by_identity() {
        let a = Value::object(Instance::new("Point"));
        let b = Value::object(Instance::new("Point"));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn boxing_round_trip_preserves_kind() {
        let p = Primitive::Long(7);
        let boxed = p.boxed();
        assert_eq!(boxed, Value::Long(7));
        assert_eq!(boxed.as_boxed_primitive(), Some(p));
    }

    #[test]
    fn instance_fields() {
        let obj = Instance::new("Counter");
        assert_eq!(obj.get_field("count"), None);
        obj.set_field("count", Value::Int(3));
        assert_eq!(obj.get_field("count"), Some(Value::Int(3)));
    }
}
