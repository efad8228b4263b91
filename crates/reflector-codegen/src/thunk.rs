// crates/reflector-codegen/src/thunk.rs
//
// Per-method routines: unpack `(receiver, arguments)` from the uniform
// dispatch convention, call the target with its declared types, and turn the
// result back into an opaque value.
//
// Bounds and type checks are left to the emitted coercions; nothing here
// validates argument counts ahead of the call.

use reflector_runtime::{MethodSig, TypeRef};

use crate::descriptor::{CallShape, MethodDescriptor};
use crate::emitter::{Access, CallKind, CodeEmitter, ReturnKind, emit_coercion, locals};
use crate::errors::{CodegenError, CodegenResult};

/// Name of the routine for the descriptor at `position`.
pub fn thunk_name(prefix: &str, position: usize) -> String {
    format!("{}{}", prefix, position)
}

/// Emit the complete private routine `name` for `method`.
pub fn emit_thunk<E: CodeEmitter>(
    emitter: &mut E,
    name: &str,
    method: &MethodDescriptor,
) -> CodegenResult<()> {
    tracing::trace!(thunk = name, method = %method, "emitting thunk");
    emitter.begin_method(Access::Private, name, &MethodSig::dispatch())?;
    emit_invocation(emitter, method)?;
    emit_result(emitter, &method.return_type)?;
    emitter.ret(ReturnKind::Reference)?;
    emitter.end_method()
}

/// Receiver narrowing, argument unpacking and the call itself.
fn emit_invocation<E: CodeEmitter>(emitter: &mut E, method: &MethodDescriptor) -> CodegenResult<()> {
    let shape = method.call_shape();
    let target = method.call_target();
    let owner = target.class_name().ok_or_else(|| {
        CodegenError::type_mismatch("call target", "a class or interface", target.to_string())
    })?;

    if shape != CallShape::Static {
        emitter.load_local(locals::RECEIVER)?;
        emit_coercion(emitter, target)?;
    }
    emit_arguments(emitter, &method.parameter_types)?;

    let kind = match shape {
        CallShape::Static => CallKind::Static,
        CallShape::Virtual => CallKind::Virtual,
        CallShape::Interface => CallKind::Interface,
    };
    emitter.invoke(kind, owner, &method.name, &method.signature())
}

/// `arguments[i]`, coerced to the declared type of parameter `i`, in order.
fn emit_arguments<E: CodeEmitter>(emitter: &mut E, params: &[TypeRef]) -> CodegenResult<()> {
    for (i, ty) in params.iter().enumerate() {
        let index = i32::try_from(i)
            .map_err(|_| CodegenError::type_mismatch("parameter index", "an int", i.to_string()))?;
        emitter.load_local(locals::ARGUMENTS)?;
        emitter.push_int(index)?;
        emitter.array_load()?;
        emit_coercion(emitter, ty)?;
    }
    Ok(())
}

/// Leave exactly one reference on the stack: null for void, boxed primitives.
fn emit_result<E: CodeEmitter>(emitter: &mut E, ret: &TypeRef) -> CodegenResult<()> {
    match ret {
        TypeRef::Void => emitter.push_null(),
        TypeRef::Primitive(p) => emitter.box_value(*p),
        TypeRef::Class(_) | TypeRef::Array(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflector_runtime::PrimitiveType;

    /// Records emitted operations as text.
    #[derive(Default)]
    struct Trace(Vec<String>);

    impl CodeEmitter for Trace {
        type Label = usize;
        type Output = Vec<String>;

        fn begin_unit(&mut self, name: &str, base: &str) -> CodegenResult<()> {
            self.0.push(format!("unit {} : {}", name, base));
            Ok(())
        }
        fn begin_method(&mut self, _: Access, name: &str, _: &MethodSig) -> CodegenResult<()> {
            self.0.push(format!("begin {}", name));
            Ok(())
        }
        fn new_label(&mut self) -> usize {
            0
        }
        fn place_label(&mut self, _: usize) -> CodegenResult<()> {
            Ok(())
        }
        fn load_local(&mut self, slot: u16) -> CodegenResult<()> {
            self.0.push(format!("load {}", slot));
            Ok(())
        }
        fn push_int(&mut self, value: i32) -> CodegenResult<()> {
            self.0.push(format!("int {}", value));
            Ok(())
        }
        fn push_null(&mut self) -> CodegenResult<()> {
            self.0.push("null".into());
            Ok(())
        }
        fn array_load(&mut self) -> CodegenResult<()> {
            self.0.push("aload".into());
            Ok(())
        }
        fn unbox(&mut self, ty: PrimitiveType) -> CodegenResult<()> {
            self.0.push(format!("unbox {}", ty));
            Ok(())
        }
        fn check_cast(&mut self, ty: &TypeRef) -> CodegenResult<()> {
            self.0.push(format!("cast {}", ty));
            Ok(())
        }
        fn invoke(&mut self, kind: CallKind, owner: &str, name: &str, _: &MethodSig) -> CodegenResult<()> {
            self.0.push(format!("{} {}.{}", kind.mnemonic(), owner, name));
            Ok(())
        }
        fn box_value(&mut self, ty: PrimitiveType) -> CodegenResult<()> {
            self.0.push(format!("box {}", ty));
            Ok(())
        }
        fn ret(&mut self, kind: ReturnKind) -> CodegenResult<()> {
            self.0.push(format!("ret {:?}", kind));
            Ok(())
        }
        fn lookup_switch(&mut self, _: usize, _: &[(i32, usize)]) -> CodegenResult<()> {
            Ok(())
        }
        fn table_switch(&mut self, _: i32, _: usize, _: &[usize]) -> CodegenResult<()> {
            Ok(())
        }
        fn end_method(&mut self) -> CodegenResult<()> {
            self.0.push("end".into());
            Ok(())
        }
        fn finish_unit(self) -> CodegenResult<Vec<String>> {
            Ok(self.0)
        }
    }

    fn trace_of(method: &MethodDescriptor) -> Vec<String> {
        let mut t = Trace::default();
        emit_thunk(&mut t, "m0", method).unwrap();
        t.0
    }

    #[test]
    fn virtual_thunk_without_parameters() {
        let m = MethodDescriptor::instance("String", "len", [], TypeRef::int());
        assert_eq!(
            trace_of(&m),
            [
                "begin m0",
                "load 2",
                "cast String",
                "invokevirtual String.len",
                "box int",
                "ret Reference",
                "end"
            ]
        );
    }

    #[test]
    fn static_thunk_unpacks_and_never_loads_receiver() {
        let m = MethodDescriptor::static_method(
            "Math",
            "max",
            [TypeRef::int(), TypeRef::Primitive(PrimitiveType::Long)],
            TypeRef::Primitive(PrimitiveType::Long),
        );
        assert_eq!(
            trace_of(&m),
            [
                "begin m0",
                "load 3",
                "int 0",
                "aload",
                "unbox int",
                "load 3",
                "int 1",
                "aload",
                "unbox long",
                "invokestatic Math.max",
                "box long",
                "ret Reference",
                "end"
            ]
        );
    }

    #[test]
    fn interface_thunk_casts_to_interface_and_returns_null_for_void() {
        let m = MethodDescriptor::instance("ArrayList", "add", [TypeRef::object()], TypeRef::Void)
            .via_interface("List");
        assert_eq!(
            trace_of(&m),
            [
                "begin m0",
                "load 2",
                "cast List",
                "load 3",
                "int 0",
                "aload",
                "invokeinterface List.add",
                "null",
                "ret Reference",
                "end"
            ]
        );
    }

    #[test]
    fn reference_results_are_returned_as_is() {
        let m = MethodDescriptor::instance("Object", "toString", [], TypeRef::string());
        let ops = trace_of(&m);
        assert_eq!(ops[1], "load 2");
        assert_eq!(ops[2], "invokevirtual Object.toString");
        assert!(!ops.iter().any(|op| op.starts_with("box") || op == "null"));
    }

    #[test]
    fn non_class_target_is_rejected() {
        let m = MethodDescriptor::new(TypeRef::int(), "oops", [], TypeRef::Void, true);
        let mut t = Trace::default();
        assert!(emit_thunk(&mut t, "m0", &m).is_err());
    }
}
