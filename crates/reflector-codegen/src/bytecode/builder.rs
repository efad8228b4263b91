// crates/reflector-codegen/src/bytecode/builder.rs
//
// `CodeEmitter` implementation producing a `CompiledUnit`. Tracks operand
// stack depth while emitting so each routine records its own maxima, and
// resolves labels to op indices when a routine ends.

use reflector_runtime::{MethodSig, PrimitiveType, TypeRef};
use rustc_hash::FxHashSet;
use std::sync::Arc;

use super::{CallSite, CompiledMethod, CompiledUnit, Op};
use crate::emitter::{Access, CallKind, CodeEmitter, ReturnKind};
use crate::errors::{CodegenError, CodegenResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(u32);

/// Routine under construction. Branch targets in `code` hold label ids until
/// `end_method` rewrites them to op indices.
struct MethodState {
    access: Access,
    name: Arc<str>,
    sig: MethodSig,
    code: Vec<Op>,
    /// Op index each label is bound to.
    bound: Vec<Option<usize>>,
    /// Stack depth on entry to each label, once a branch to it is emitted.
    entry_depth: Vec<Option<u16>>,
    depth: u16,
    max_stack: u16,
    max_locals: u16,
    /// False after a terminator until the next label.
    reachable: bool,
}

impl MethodState {
    fn context(&self) -> String {
        format!("{} at op {}", self.name, self.code.len())
    }

    fn pop(&mut self, count: u16) -> CodegenResult<()> {
        if !self.reachable {
            return Err(CodegenError::invalid_state_with_context(
                "unreachable instruction",
                self.context(),
            ));
        }
        self.depth = self.depth.checked_sub(count).ok_or_else(|| {
            CodegenError::invalid_state_with_context("operand stack underflow", self.context())
        })?;
        Ok(())
    }

    fn push(&mut self, count: u16) -> CodegenResult<()> {
        if !self.reachable {
            return Err(CodegenError::invalid_state_with_context(
                "unreachable instruction",
                self.context(),
            ));
        }
        self.depth = self.depth.checked_add(count).ok_or_else(|| {
            CodegenError::invalid_state_with_context("operand stack overflow", self.context())
        })?;
        self.max_stack = self.max_stack.max(self.depth);
        Ok(())
    }

    fn label_index(&self, label: Label) -> CodegenResult<usize> {
        let index = label.0 as usize;
        if index < self.bound.len() {
            Ok(index)
        } else {
            Err(CodegenError::not_found("label", format!("L{}", label.0)))
        }
    }

    /// Record the depth a branch carries into `label`.
    fn branch_to(&mut self, label: Label) -> CodegenResult<()> {
        let index = self.label_index(label)?;
        match self.entry_depth[index] {
            Some(depth) if depth != self.depth => Err(CodegenError::invalid_state_with_context(
                "inconsistent stack depth at label",
                format!("L{} in {}", label.0, self.name),
            )),
            _ => {
                self.entry_depth[index] = Some(self.depth);
                Ok(())
            }
        }
    }

    fn terminate(&mut self) {
        self.reachable = false;
        self.depth = 0;
    }

    fn resolve(&self, label_id: usize) -> CodegenResult<usize> {
        self.bound
            .get(label_id)
            .copied()
            .flatten()
            .ok_or_else(|| {
                CodegenError::invalid_state_with_context(
                    "branch to unplaced label",
                    format!("L{} in {}", label_id, self.name),
                )
            })
    }
}

/// Builds one [`CompiledUnit`].
#[derive(Default)]
pub struct UnitBuilder {
    unit: Option<(Arc<str>, Arc<str>)>,
    methods: Vec<CompiledMethod>,
    signatures: FxHashSet<(Arc<str>, Arc<str>)>,
    current: Option<MethodState>,
}

impl UnitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn method(&mut self) -> CodegenResult<&mut MethodState> {
        self.current
            .as_mut()
            .ok_or_else(|| CodegenError::invalid_state("instruction outside of a method"))
    }

    /// Apply a stack effect and append `op`.
    fn emit(&mut self, pops: u16, pushes: u16, op: Op) -> CodegenResult<()> {
        let method = self.method()?;
        method.pop(pops)?;
        method.push(pushes)?;
        method.code.push(op);
        Ok(())
    }
}

impl CodeEmitter for UnitBuilder {
    type Label = Label;
    type Output = CompiledUnit;

    fn begin_unit(&mut self, name: &str, base: &str) -> CodegenResult<()> {
        if let Some((existing, _)) = &self.unit {
            return Err(CodegenError::invalid_state_with_context(
                "unit already started",
                existing.to_string(),
            ));
        }
        self.unit = Some((Arc::from(name), Arc::from(base)));
        Ok(())
    }

    fn begin_method(&mut self, access: Access, name: &str, sig: &MethodSig) -> CodegenResult<()> {
        if self.unit.is_none() {
            return Err(CodegenError::invalid_state("method begun before the unit"));
        }
        if let Some(open) = &self.current {
            return Err(CodegenError::invalid_state_with_context(
                "method begun inside another method",
                open.name.to_string(),
            ));
        }
        let params = u16::try_from(sig.params.len())
            .map_err(|_| CodegenError::type_mismatch("parameter count", "at most 65534", sig.params.len().to_string()))?;
        self.current = Some(MethodState {
            access,
            name: Arc::from(name),
            sig: sig.clone(),
            code: Vec::new(),
            bound: Vec::new(),
            entry_depth: Vec::new(),
            depth: 0,
            max_stack: 0,
            max_locals: params.saturating_add(1),
            reachable: true,
        });
        Ok(())
    }

    fn new_label(&mut self) -> Label {
        match self.current.as_mut() {
            Some(method) => {
                method.bound.push(None);
                method.entry_depth.push(None);
                Label((method.bound.len() - 1) as u32)
            }
            // Never bindable; reported when used.
            None => Label(u32::MAX),
        }
    }

    fn place_label(&mut self, label: Label) -> CodegenResult<()> {
        let method = self.method()?;
        let index = method.label_index(label)?;
        if method.bound[index].is_some() {
            return Err(CodegenError::invalid_state_with_context(
                "label placed twice",
                format!("L{} in {}", label.0, method.name),
            ));
        }
        method.bound[index] = Some(method.code.len());
        if let Some(depth) = method.entry_depth[index] {
            method.depth = depth;
        } else if !method.reachable {
            method.depth = 0;
        }
        method.reachable = true;
        Ok(())
    }

    fn load_local(&mut self, slot: u16) -> CodegenResult<()> {
        let method = self.method()?;
        if slot >= method.max_locals {
            return Err(CodegenError::type_mismatch(
                "local slot",
                format!("below {}", method.max_locals),
                slot.to_string(),
            ));
        }
        self.emit(0, 1, Op::LoadLocal(slot))
    }

    fn push_int(&mut self, value: i32) -> CodegenResult<()> {
        self.emit(0, 1, Op::PushInt(value))
    }

    fn push_null(&mut self) -> CodegenResult<()> {
        self.emit(0, 1, Op::PushNull)
    }

    fn array_load(&mut self) -> CodegenResult<()> {
        self.emit(2, 1, Op::ArrayLoad)
    }

    fn unbox(&mut self, ty: PrimitiveType) -> CodegenResult<()> {
        self.emit(1, 1, Op::Unbox(ty))
    }

    fn check_cast(&mut self, ty: &TypeRef) -> CodegenResult<()> {
        if !ty.is_reference() {
            return Err(CodegenError::type_mismatch(
                "cast target",
                "a reference type",
                ty.to_string(),
            ));
        }
        self.emit(1, 1, Op::CheckCast(ty.clone()))
    }

    fn invoke(&mut self, kind: CallKind, owner: &str, name: &str, sig: &MethodSig) -> CodegenResult<()> {
        let args = sig.params.len() + usize::from(kind.has_receiver());
        let pops = u16::try_from(args)
            .map_err(|_| CodegenError::type_mismatch("argument count", "at most 65535", args.to_string()))?;
        let pushes = u16::from(!sig.returns_void());
        let site = CallSite {
            kind,
            owner: Arc::from(owner),
            name: Arc::from(name),
            sig: sig.clone(),
            descriptor: Arc::from(sig.descriptor()),
        };
        self.emit(pops, pushes, Op::Invoke(site))
    }

    fn box_value(&mut self, ty: PrimitiveType) -> CodegenResult<()> {
        self.emit(1, 1, Op::Box(ty))
    }

    fn ret(&mut self, kind: ReturnKind) -> CodegenResult<()> {
        let method = self.method()?;
        let declared_void = method.sig.returns_void();
        let (pops, op) = match kind {
            ReturnKind::Void if declared_void => (0, Op::ReturnVoid),
            ReturnKind::Reference if method.sig.ret.is_reference() => (1, Op::Return),
            _ => {
                return Err(CodegenError::type_mismatch(
                    "return",
                    method.sig.ret.to_string(),
                    format!("{:?}", kind),
                ));
            }
        };
        self.emit(pops, 0, op)?;
        self.method()?.terminate();
        Ok(())
    }

    fn lookup_switch(&mut self, default: Label, cases: &[(i32, Label)]) -> CodegenResult<()> {
        let mut sorted: Vec<(i32, usize)> = Vec::with_capacity(cases.len());
        {
            let method = self.method()?;
            method.pop(1)?;
            method.branch_to(default)?;
            for &(key, label) in cases {
                method.branch_to(label)?;
                sorted.push((key, label.0 as usize));
            }
        }
        sorted.sort_unstable_by_key(|(key, _)| *key);
        if let Some(pair) = sorted.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(CodegenError::invalid_state_with_context(
                "duplicate switch key",
                pair[0].0.to_string(),
            ));
        }
        let method = self.method()?;
        method.code.push(Op::LookupSwitch {
            default: default.0 as usize,
            cases: sorted.into_boxed_slice(),
        });
        method.terminate();
        Ok(())
    }

    fn table_switch(&mut self, low: i32, default: Label, targets: &[Label]) -> CodegenResult<()> {
        if targets.is_empty() {
            return Err(CodegenError::invalid_state("table switch without targets"));
        }
        let method = self.method()?;
        method.pop(1)?;
        method.branch_to(default)?;
        for &label in targets {
            method.branch_to(label)?;
        }
        method.code.push(Op::TableSwitch {
            low,
            default: default.0 as usize,
            targets: targets.iter().map(|l| l.0 as usize).collect(),
        });
        method.terminate();
        Ok(())
    }

    fn end_method(&mut self) -> CodegenResult<()> {
        let method = self
            .current
            .take()
            .ok_or_else(|| CodegenError::invalid_state("end_method without begin_method"))?;
        if method.reachable {
            return Err(CodegenError::invalid_state_with_context(
                "routine falls off its end",
                method.name.to_string(),
            ));
        }

        let mut code = Vec::with_capacity(method.code.len());
        for op in &method.code {
            let resolved = match op {
                Op::LookupSwitch { default, cases } => Op::LookupSwitch {
                    default: method.resolve(*default)?,
                    cases: cases
                        .iter()
                        .map(|(key, label)| Ok((*key, method.resolve(*label)?)))
                        .collect::<CodegenResult<_>>()?,
                },
                Op::TableSwitch {
                    low,
                    default,
                    targets,
                } => Op::TableSwitch {
                    low: *low,
                    default: method.resolve(*default)?,
                    targets: targets
                        .iter()
                        .map(|label| method.resolve(*label))
                        .collect::<CodegenResult<_>>()?,
                },
                other => other.clone(),
            };
            code.push(resolved);
        }

        let descriptor: Arc<str> = Arc::from(method.sig.descriptor());
        if !self.signatures.insert((method.name.clone(), descriptor.clone())) {
            return Err(CodegenError::invalid_state_with_context(
                "duplicate method",
                format!("{}{}", method.name, descriptor),
            ));
        }
        self.methods.push(CompiledMethod {
            access: method.access,
            name: method.name,
            sig: method.sig,
            descriptor,
            code,
            max_stack: method.max_stack,
            max_locals: method.max_locals,
        });
        Ok(())
    }

    fn finish_unit(self) -> CodegenResult<CompiledUnit> {
        if let Some(open) = &self.current {
            return Err(CodegenError::invalid_state_with_context(
                "unit finished with an open method",
                open.name.to_string(),
            ));
        }
        let (name, base) = self
            .unit
            .ok_or_else(|| CodegenError::invalid_state("unit finished before it was begun"))?;
        Ok(CompiledUnit {
            name,
            base,
            methods: self.methods,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> UnitBuilder {
        let mut b = UnitBuilder::new();
        b.begin_unit("Test", "Reflector").unwrap();
        b
    }

    #[test]
    fn tracks_max_stack_and_locals() {
        let mut b = started();
        b.begin_method(Access::Private, "m0", &MethodSig::dispatch()).unwrap();
        b.load_local(3).unwrap();
        b.push_int(0).unwrap();
        b.array_load().unwrap();
        b.load_local(3).unwrap();
        b.push_int(1).unwrap();
        b.array_load().unwrap();
        b.invoke(
            CallKind::Static,
            "Math",
            "max",
            &MethodSig::new([TypeRef::object(), TypeRef::object()], TypeRef::object()),
        )
        .unwrap();
        b.ret(ReturnKind::Reference).unwrap();
        b.end_method().unwrap();
        let unit = b.finish_unit().unwrap();

        let m = unit.method("m0").unwrap();
        assert_eq!(m.max_stack, 3);
        assert_eq!(m.max_locals, 4);
        assert_eq!(m.code.len(), 8);
    }

    #[test]
    fn labels_resolve_to_op_indices() {
        let mut b = started();
        b.begin_method(Access::Public, "invoke", &MethodSig::dispatch()).unwrap();
        b.load_local(1).unwrap();
        let default = b.new_label();
        let one = b.new_label();
        b.lookup_switch(default, &[(1, one)]).unwrap();
        b.place_label(one).unwrap();
        b.push_null().unwrap();
        b.ret(ReturnKind::Reference).unwrap();
        b.place_label(default).unwrap();
        b.push_null().unwrap();
        b.ret(ReturnKind::Reference).unwrap();
        b.end_method().unwrap();
        let unit = b.finish_unit().unwrap();

        let code = &unit.method("invoke").unwrap().code;
        assert_eq!(
            code[1],
            Op::LookupSwitch {
                default: 4,
                cases: vec![(1, 2)].into_boxed_slice()
            }
        );
    }

    #[test]
    fn switch_cases_are_sorted() {
        let mut b = started();
        b.begin_method(Access::Public, "invoke", &MethodSig::dispatch()).unwrap();
        b.load_local(1).unwrap();
        let default = b.new_label();
        let a = b.new_label();
        let c = b.new_label();
        b.lookup_switch(default, &[(9, a), (2, c)]).unwrap();
        for label in [a, c, default] {
            b.place_label(label).unwrap();
            b.push_null().unwrap();
            b.ret(ReturnKind::Reference).unwrap();
        }
        b.end_method().unwrap();
        let unit = b.finish_unit().unwrap();
        let (keys, _) = unit.method("invoke").unwrap().switch_arms().unwrap();
        assert_eq!(keys, vec![2, 9]);
    }

    #[test]
    fn unplaced_label_is_an_error() {
        let mut b = started();
        b.begin_method(Access::Public, "invoke", &MethodSig::dispatch()).unwrap();
        b.load_local(1).unwrap();
        let default = b.new_label();
        b.lookup_switch(default, &[]).unwrap();
        assert!(b.end_method().is_err());
    }

    #[test]
    fn stack_underflow_is_an_error() {
        let mut b = started();
        b.begin_method(Access::Private, "m0", &MethodSig::dispatch()).unwrap();
        assert!(b.array_load().is_err());
    }

    #[test]
    fn stack_overflow_is_an_error() {
        let mut b = started();
        b.begin_method(Access::Private, "m0", &MethodSig::dispatch()).unwrap();
        for _ in 0..u16::MAX {
            b.push_null().unwrap();
        }
        assert!(b.push_int(0).is_err());
    }

    #[test]
    fn return_kind_must_match_signature() {
        let mut b = started();
        b.begin_method(Access::Public, "<init>", &MethodSig::nullary_void()).unwrap();
        b.push_null().unwrap();
        assert!(b.ret(ReturnKind::Reference).is_err());
    }

    #[test]
    fn structural_misuse() {
        let mut b = UnitBuilder::new();
        assert!(b.push_int(1).is_err());
        assert!(b.begin_method(Access::Public, "x", &MethodSig::nullary_void()).is_err());
        b.begin_unit("Test", "Reflector").unwrap();
        assert!(b.begin_unit("Again", "Reflector").is_err());
        b.begin_method(Access::Public, "x", &MethodSig::nullary_void()).unwrap();
        assert!(b.load_local(1).is_err());
        assert!(b.end_method().is_err());
        let mut b = started();
        b.begin_method(Access::Public, "x", &MethodSig::nullary_void()).unwrap();
        assert!(b.finish_unit().is_err());
    }

    #[test]
    fn duplicate_routines_are_rejected() {
        let mut b = started();
        for _ in 0..2 {
            b.begin_method(Access::Public, "<init>", &MethodSig::nullary_void()).unwrap();
            b.ret(ReturnKind::Void).unwrap();
            if b.end_method().is_err() {
                return;
            }
        }
        panic!("second <init>()V was accepted");
    }
}
