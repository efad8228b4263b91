// crates/reflector-codegen/src/bytecode/disasm.rs
//
// Text listing of compiled units.

use std::fmt;

use super::{CompiledMethod, CompiledUnit, Op};

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::LoadLocal(slot) => write!(f, "load {}", slot),
            Op::PushInt(value) => write!(f, "iconst {}", value),
            Op::PushNull => write!(f, "aconst_null"),
            Op::ArrayLoad => write!(f, "aaload"),
            Op::Unbox(ty) => write!(f, "unbox {}", ty),
            Op::CheckCast(ty) => write!(f, "checkcast {}", ty),
            Op::Invoke(site) => write!(
                f,
                "{} {}.{}{}",
                site.kind.mnemonic(),
                site.owner,
                site.name,
                site.descriptor
            ),
            Op::Box(ty) => write!(f, "box {}", ty),
            Op::Return => write!(f, "areturn"),
            Op::ReturnVoid => write!(f, "return"),
            Op::LookupSwitch { default, cases } => {
                write!(f, "lookupswitch default=@{} {{", default)?;
                for (i, (key, target)) in cases.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: @{}", key, target)?;
                }
                write!(f, "}}")
            }
            Op::TableSwitch {
                low,
                default,
                targets,
            } => {
                write!(f, "tableswitch low={} default=@{} [", low, default)?;
                for (i, target) in targets.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "@{}", target)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl fmt::Display for CompiledMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} {}{} [stack={}, locals={}]",
            self.access.keyword(),
            self.name,
            self.descriptor,
            self.max_stack,
            self.max_locals
        )?;
        for (i, op) in self.code.iter().enumerate() {
            writeln!(f, "  {:>3}: {}", i, op)?;
        }
        Ok(())
    }
}

impl fmt::Display for CompiledUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "unit {} extends {}", self.name, self.base)?;
        for method in &self.methods {
            writeln!(f)?;
            write!(f, "{}", method)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::CallSite;
    use crate::emitter::{Access, CallKind};
    use reflector_runtime::{MethodSig, PrimitiveType, TypeRef};
    use std::sync::Arc;

    #[test]
    fn op_listing() {
        let sig = MethodSig::new([TypeRef::string()], TypeRef::int());
        let site = CallSite {
            kind: CallKind::Static,
            owner: Arc::from("Integer"),
            name: Arc::from("parseInt"),
            descriptor: Arc::from(sig.descriptor()),
            sig,
        };
        assert_eq!(Op::Invoke(site).to_string(), "invokestatic Integer.parseInt(LString;)I");
        assert_eq!(Op::Unbox(PrimitiveType::Long).to_string(), "unbox long");
        assert_eq!(
            Op::LookupSwitch {
                default: 9,
                cases: vec![(1, 6), (2, 8)].into_boxed_slice()
            }
            .to_string(),
            "lookupswitch default=@9 {1: @6, 2: @8}"
        );
        assert_eq!(
            Op::TableSwitch {
                low: 1,
                default: 5,
                targets: vec![3, 5, 4].into_boxed_slice()
            }
            .to_string(),
            "tableswitch low=1 default=@5 [@3, @5, @4]"
        );
    }

    #[test]
    fn method_listing() {
        let method = CompiledMethod {
            access: Access::Public,
            name: Arc::from("<init>"),
            sig: MethodSig::nullary_void(),
            descriptor: Arc::from("()V"),
            code: vec![Op::LoadLocal(0), Op::ReturnVoid],
            max_stack: 1,
            max_locals: 1,
        };
        assert_eq!(
            method.to_string(),
            "public <init>()V [stack=1, locals=1]\n    0: load 0\n    1: return\n"
        );
    }
}
