// crates/reflector-runtime/src/types.rs
//
// Semantic types as seen by generated dispatch code: primitives, class
// references, arrays and the "no value" marker, plus method signatures and
// their compact descriptor strings.

use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Well-known class names of the builtin hierarchy.
pub mod well_known {
    pub const OBJECT: &str = "Object";
    pub const NUMBER: &str = "Number";
    pub const STRING: &str = "String";
    pub const CHAR_SEQUENCE: &str = "CharSequence";
    pub const COMPARABLE: &str = "Comparable";
    pub const BOOLEAN: &str = "Boolean";
    pub const BYTE: &str = "Byte";
    pub const CHARACTER: &str = "Character";
    pub const SHORT: &str = "Short";
    pub const INTEGER: &str = "Integer";
    pub const LONG: &str = "Long";
    pub const FLOAT: &str = "Float";
    pub const DOUBLE: &str = "Double";
    /// Runtime class of every array value.
    pub const OBJECT_ARRAY: &str = "Object[]";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl PrimitiveType {
    pub const ALL: [PrimitiveType; 8] = [
        PrimitiveType::Boolean,
        PrimitiveType::Byte,
        PrimitiveType::Char,
        PrimitiveType::Short,
        PrimitiveType::Int,
        PrimitiveType::Long,
        PrimitiveType::Float,
        PrimitiveType::Double,
    ];

    /// Single-letter descriptor code.
    pub fn descriptor_char(self) -> char {
        match self {
            PrimitiveType::Boolean => 'Z',
            PrimitiveType::Byte => 'B',
            PrimitiveType::Char => 'C',
            PrimitiveType::Short => 'S',
            PrimitiveType::Int => 'I',
            PrimitiveType::Long => 'J',
            PrimitiveType::Float => 'F',
            PrimitiveType::Double => 'D',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Byte => "byte",
            PrimitiveType::Char => "char",
            PrimitiveType::Short => "short",
            PrimitiveType::Int => "int",
            PrimitiveType::Long => "long",
            PrimitiveType::Float => "float",
            PrimitiveType::Double => "double",
        }
    }

    /// The class whose instances hold this primitive in boxed form.
    pub fn wrapper_class(self) -> &'static str {
        match self {
            PrimitiveType::Boolean => well_known::BOOLEAN,
            PrimitiveType::Byte => well_known::BYTE,
            PrimitiveType::Char => well_known::CHARACTER,
            PrimitiveType::Short => well_known::SHORT,
            PrimitiveType::Int => well_known::INTEGER,
            PrimitiveType::Long => well_known::LONG,
            PrimitiveType::Float => well_known::FLOAT,
            PrimitiveType::Double => well_known::DOUBLE,
        }
    }

    /// True for the six numeric kinds (everything except boolean and char).
    pub fn is_numeric(self) -> bool {
        !matches!(self, PrimitiveType::Boolean | PrimitiveType::Char)
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A semantic type: the declared type of a parameter, return value or call target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// The "no value" return marker.
    Void,
    Primitive(PrimitiveType),
    Class(Arc<str>),
    Array(Box<TypeRef>),
}

impl TypeRef {
    pub fn class(name: impl AsRef<str>) -> Self {
        TypeRef::Class(Arc::from(name.as_ref()))
    }

    pub fn array(element: TypeRef) -> Self {
        TypeRef::Array(Box::new(element))
    }

    pub fn object() -> Self {
        Self::class(well_known::OBJECT)
    }

    pub fn string() -> Self {
        Self::class(well_known::STRING)
    }

    pub fn object_array() -> Self {
        Self::array(Self::object())
    }

    pub fn int() -> Self {
        TypeRef::Primitive(PrimitiveType::Int)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeRef::Void)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, TypeRef::Class(_) | TypeRef::Array(_))
    }

    /// True for the root class, to which every reference already conforms.
    pub fn is_object(&self) -> bool {
        matches!(self, TypeRef::Class(name) if &**name == well_known::OBJECT)
    }

    pub fn as_primitive(&self) -> Option<PrimitiveType> {
        match self {
            TypeRef::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    pub fn class_name(&self) -> Option<&str> {
        match self {
            TypeRef::Class(name) => Some(name),
            _ => None,
        }
    }

    /// Append the compact descriptor form of this type to `out`.
    pub fn write_descriptor(&self, out: &mut String) {
        match self {
            TypeRef::Void => out.push('V'),
            TypeRef::Primitive(p) => out.push(p.descriptor_char()),
            TypeRef::Class(name) => {
                out.push('L');
                out.push_str(name);
                out.push(';');
            }
            TypeRef::Array(element) => {
                out.push('[');
                element.write_descriptor(out);
            }
        }
    }

    pub fn descriptor(&self) -> String {
        let mut out = String::new();
        self.write_descriptor(&mut out);
        out
    }
}

impl From<PrimitiveType> for TypeRef {
    fn from(p: PrimitiveType) -> Self {
        TypeRef::Primitive(p)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Void => f.write_str("void"),
            TypeRef::Primitive(p) => write!(f, "{}", p),
            TypeRef::Class(name) => f.write_str(name),
            TypeRef::Array(element) => write!(f, "{}[]", element),
        }
    }
}

pub type ParamTypes = SmallVec<[TypeRef; 4]>;

/// Return type plus ordered parameter types of a callable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSig {
    pub params: ParamTypes,
    pub ret: TypeRef,
}

impl MethodSig {
    pub fn new(params: impl IntoIterator<Item = TypeRef>, ret: TypeRef) -> Self {
        Self {
            params: params.into_iter().collect(),
            ret,
        }
    }

    /// `()V`
    pub fn nullary_void() -> Self {
        Self::new([], TypeRef::Void)
    }

    /// `(ILObject;[LObject;)LObject;`: the shape shared by the dispatch
    /// entry point, every per-method routine and the fallback handler.
    pub fn dispatch() -> Self {
        Self::new(
            [TypeRef::int(), TypeRef::object(), TypeRef::object_array()],
            TypeRef::object(),
        )
    }

    pub fn returns_void(&self) -> bool {
        self.ret.is_void()
    }

    /// Compact descriptor such as `(LString;I)J`.
    pub fn descriptor(&self) -> String {
        let mut out = String::from("(");
        for param in &self.params {
            param.write_descriptor(&mut out);
        }
        out.push(')');
        self.ret.write_descriptor(&mut out);
        out
    }
}

impl fmt::Display for MethodSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ") -> {}", self.ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_descriptors() {
        let letters: String = PrimitiveType::ALL
            .iter()
            .map(|p| p.descriptor_char())
            .collect();
        assert_eq!(letters, "ZBCSIJFD");
    }

    #[test]
    fn dispatch_signature_descriptor() {
        assert_eq!(
            MethodSig::dispatch().descriptor(),
            "(ILObject;[LObject;)LObject;"
        );
    }

    #[test]
    fn mixed_signature_descriptor() {
        let sig = MethodSig::new(
            [
                TypeRef::string(),
                TypeRef::Primitive(PrimitiveType::Long),
                TypeRef::array(TypeRef::int()),
            ],
            TypeRef::Void,
        );
        assert_eq!(sig.descriptor(), "(LString;J[I)V");
        assert_eq!(sig.to_string(), "(String, long, int[]) -> void");
    }

    #[test]
    fn object_detection() {
        assert!(TypeRef::object().is_object());
        assert!(!TypeRef::string().is_object());
        assert!(!TypeRef::object_array().is_object());
    }
}
