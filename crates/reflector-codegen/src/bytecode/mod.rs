// crates/reflector-codegen/src/bytecode/mod.rs
//
// A compact stack bytecode for generated dispatcher units. `UnitBuilder`
// emits it; the loader executes it.

mod builder;
mod disasm;

pub use builder::{Label, UnitBuilder};

use reflector_runtime::{MethodSig, PrimitiveType, TypeRef};
use std::sync::Arc;

use crate::emitter::{Access, CallKind};

/// A resolved call target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub kind: CallKind,
    pub owner: Arc<str>,
    pub name: Arc<str>,
    pub sig: MethodSig,
    /// `sig.descriptor()`, computed once at emission.
    pub descriptor: Arc<str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    LoadLocal(u16),
    PushInt(i32),
    PushNull,
    ArrayLoad,
    Unbox(PrimitiveType),
    CheckCast(TypeRef),
    Invoke(CallSite),
    Box(PrimitiveType),
    /// Return the reference on top of the stack.
    Return,
    ReturnVoid,
    /// Targets are op indices. Cases are sorted by key.
    LookupSwitch {
        default: usize,
        cases: Box<[(i32, usize)]>,
    },
    /// `targets[key - low]`, else `default`.
    TableSwitch {
        low: i32,
        default: usize,
        targets: Box<[usize]>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledMethod {
    pub access: Access,
    pub name: Arc<str>,
    pub sig: MethodSig,
    pub descriptor: Arc<str>,
    pub code: Vec<Op>,
    pub max_stack: u16,
    pub max_locals: u16,
}

impl CompiledMethod {
    /// Keys of the matched branches of the first switch, and its default target.
    /// Table slots that only lead to the default are not matched branches.
    pub fn switch_arms(&self) -> Option<(Vec<i32>, usize)> {
        self.code.iter().find_map(|op| match op {
            Op::LookupSwitch { default, cases } => {
                Some((cases.iter().map(|(key, _)| *key).collect(), *default))
            }
            Op::TableSwitch {
                low,
                default,
                targets,
            } => {
                let keys = targets
                    .iter()
                    .enumerate()
                    .filter(|(_, target)| **target != *default)
                    .map(|(i, _)| *low + i as i32)
                    .collect();
                Some((keys, *default))
            }
            _ => None,
        })
    }
}

/// A finished dispatcher unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledUnit {
    pub name: Arc<str>,
    pub base: Arc<str>,
    pub methods: Vec<CompiledMethod>,
}

impl CompiledUnit {
    pub fn method(&self, name: &str) -> Option<&CompiledMethod> {
        self.methods.iter().find(|m| &*m.name == name)
    }

    pub fn method_index(&self, name: &str, descriptor: &str) -> Option<usize> {
        self.methods
            .iter()
            .position(|m| &*m.name == name && &*m.descriptor == descriptor)
    }
}
