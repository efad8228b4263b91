// crates/reflector-runtime/src/convert.rs
//
// Coercions between the opaque representation and declared types: unboxing
// to a primitive, reference narrowing, and boxing.

use crate::class_registry::ClassRegistry;
use crate::fault::{Fault, FaultResult};
use crate::types::{PrimitiveType, TypeRef};
use crate::value::{Primitive, Value};

/// Unbox `value` into `target`.
///
/// Numeric targets accept any boxed number and convert it with the usual
/// truncating numeric conversions; `char` and `boolean` accept only their own
/// wrapper.
pub fn unbox(value: &Value, target: PrimitiveType) -> FaultResult<Primitive> {
    if value.is_null() {
        return Err(Fault::null_pointer(format!("cannot unbox null to {}", target)));
    }
    let mismatch = || Fault::invalid_cast(value.describe_class(), target.name());
    let boxed = value.as_boxed_primitive().ok_or_else(mismatch)?;

    match target {
        PrimitiveType::Boolean => match boxed {
            Primitive::Boolean(_) => Ok(boxed),
            _ => Err(mismatch()),
        },
        PrimitiveType::Char => match boxed {
            Primitive::Char(_) => Ok(boxed),
            _ => Err(mismatch()),
        },
        numeric => {
            let floating = matches!(boxed, Primitive::Float(_) | Primitive::Double(_));
            let (i, f) = match boxed {
                Primitive::Byte(v) => (v as i64, v as f64),
                Primitive::Short(v) => (v as i64, v as f64),
                Primitive::Int(v) => (v as i64, v as f64),
                Primitive::Long(v) => (v, v as f64),
                Primitive::Float(v) => (v as i64, v as f64),
                Primitive::Double(v) => (v as i64, v),
                Primitive::Boolean(_) | Primitive::Char(_) => return Err(mismatch()),
            };
            let converted = match numeric {
                PrimitiveType::Byte if floating => Primitive::Byte(f as i32 as i8),
                PrimitiveType::Byte => Primitive::Byte(i as i8),
                PrimitiveType::Short if floating => Primitive::Short(f as i32 as i16),
                PrimitiveType::Short => Primitive::Short(i as i16),
                PrimitiveType::Int if floating => Primitive::Int(f as i32),
                PrimitiveType::Int => Primitive::Int(i as i32),
                PrimitiveType::Long => Primitive::Long(if floating { f as i64 } else { i }),
                PrimitiveType::Float => Primitive::Float(if floating { f as f32 } else { i as f32 }),
                PrimitiveType::Double => Primitive::Double(if floating { f } else { i as f64 }),
                PrimitiveType::Boolean | PrimitiveType::Char => return Err(mismatch()),
            };
            Ok(converted)
        }
    }
}

/// Narrow a reference to `target`. Null always passes.
pub fn check_cast(classes: &ClassRegistry, value: &Value, target: &TypeRef) -> FaultResult<()> {
    if !target.is_reference() {
        return Err(Fault::internal(format!(
            "reference cast to non-reference type {}",
            target
        )));
    }
    if classes.is_instance(value, target) {
        Ok(())
    } else {
        Err(Fault::invalid_cast(value.describe_class(), target.to_string()))
    }
}

pub fn box_primitive(p: Primitive) -> Value {
    p.boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbox_exact_kinds() {
        assert_eq!(
            unbox(&Value::Int(5), PrimitiveType::Int),
            Ok(Primitive::Int(5))
        );
        assert_eq!(
            unbox(&Value::Boolean(true), PrimitiveType::Boolean),
            Ok(Primitive::Boolean(true))
        );
        assert_eq!(
            unbox(&Value::Char('x'), PrimitiveType::Char),
            Ok(Primitive::Char('x'))
        );
    }

    #[test]
    fn unbox_converts_between_numbers() {
        assert_eq!(
            unbox(&Value::Long(300), PrimitiveType::Byte),
            Ok(Primitive::Byte(44))
        );
        assert_eq!(
            unbox(&Value::Double(2.9), PrimitiveType::Int),
            Ok(Primitive::Int(2))
        );
        assert_eq!(
            unbox(&Value::Int(3), PrimitiveType::Double),
            Ok(Primitive::Double(3.0))
        );
    }

    #[test]
    fn unbox_rejects_non_numbers() {
        assert!(matches!(
            unbox(&Value::str("42"), PrimitiveType::Int),
            Err(Fault::InvalidCast { .. })
        ));
        assert!(matches!(
            unbox(&Value::Int(1), PrimitiveType::Boolean),
            Err(Fault::InvalidCast { .. })
        ));
        assert!(matches!(
            unbox(&Value::Char('a'), PrimitiveType::Int),
            Err(Fault::InvalidCast { .. })
        ));
        assert!(matches!(
            unbox(&Value::Null, PrimitiveType::Long),
            Err(Fault::NullPointer { .. })
        ));
    }

    #[test]
    fn check_cast_follows_hierarchy() {
        let classes = ClassRegistry::new();
        let number = TypeRef::class("Number");
        assert!(check_cast(&classes, &Value::Int(1), &number).is_ok());
        assert!(check_cast(&classes, &Value::Null, &number).is_ok());
        assert_eq!(
            check_cast(&classes, &Value::str("1"), &number),
            Err(Fault::invalid_cast("String", "Number"))
        );
        assert!(matches!(
            check_cast(&classes, &Value::Int(1), &TypeRef::int()),
            Err(Fault::Internal(_))
        ));
    }
}
