// crates/reflector-codegen/src/generator.rs
//
// Top-level driver: one dispatcher unit per descriptor list.

use reflector_runtime::MethodSig;
use reflector_runtime::base::{INIT, REFLECTOR_CLASS};

use crate::descriptor::MethodDescriptor;
use crate::dispatch_table::{SwitchStrategy, emit_dispatch_entry};
use crate::emitter::{Access, CallKind, CodeEmitter, ReturnKind, locals};
use crate::errors::CodegenResult;
use crate::index::{DispatchIndex, assign_tokens};
use crate::thunk::{emit_thunk, thunk_name};

/// Options for reflector generation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratorOptions {
    /// Encoding of the token switch
    pub switch_strategy: SwitchStrategy,
    /// Prefix of per-method routine names (`m` gives `m0`, `m1`, ...)
    pub thunk_prefix: String,
    /// Base contract the unit extends
    pub base_contract: String,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self::lookup()
    }
}

impl GeneratorOptions {
    /// Sparse lookup switch (default)
    pub fn lookup() -> Self {
        Self {
            switch_strategy: SwitchStrategy::Lookup,
            thunk_prefix: "m".to_string(),
            base_contract: REFLECTOR_CLASS.to_string(),
        }
    }

    /// Jump table whenever the tokens are dense
    pub fn dense() -> Self {
        Self {
            switch_strategy: SwitchStrategy::Auto,
            ..Self::lookup()
        }
    }
}

/// What one generation pass produced.
#[derive(Debug)]
pub struct GeneratedUnit<T> {
    /// The emitter's finished unit.
    pub output: T,
    /// Tokens assigned to the descriptor list.
    pub index: DispatchIndex,
}

/// Generates a dispatcher unit for a fixed descriptor list.
///
/// The list is borrowed mutably for the whole pass: tokens are written into
/// it before any routine is emitted.
pub struct ReflectorGenerator<'a> {
    methods: &'a mut [MethodDescriptor],
    options: GeneratorOptions,
}

impl<'a> ReflectorGenerator<'a> {
    pub fn new(methods: &'a mut [MethodDescriptor]) -> Self {
        Self::with_options(methods, GeneratorOptions::default())
    }

    pub fn with_options(methods: &'a mut [MethodDescriptor], options: GeneratorOptions) -> Self {
        Self { methods, options }
    }

    /// Emit the constructor, the `invoke` entry point and one private routine
    /// per descriptor into `emitter`, then finish the unit.
    pub fn generate<E: CodeEmitter>(
        self,
        mut emitter: E,
        unit_name: &str,
    ) -> CodegenResult<GeneratedUnit<E::Output>> {
        let _span = tracing::info_span!("generate_reflector", unit = unit_name).entered();
        tracing::debug!(
            methods = self.methods.len(),
            strategy = ?self.options.switch_strategy,
            "generating reflector"
        );

        let base = self.options.base_contract.as_str();
        emitter.begin_unit(unit_name, base)?;
        emit_constructor(&mut emitter, base)?;

        let index = assign_tokens(self.methods)?;
        let thunks: Vec<String> = (0..self.methods.len())
            .map(|position| thunk_name(&self.options.thunk_prefix, position))
            .collect();
        emit_dispatch_entry(
            &mut emitter,
            unit_name,
            &index,
            &thunks,
            self.options.switch_strategy,
        )?;

        for entry in index.entries() {
            emit_thunk(&mut emitter, &thunks[entry.position], &self.methods[entry.position])?;
        }

        let output = emitter.finish_unit()?;
        tracing::debug!(routines = thunks.len() + 2, "reflector generated");
        Ok(GeneratedUnit { output, index })
    }
}

/// `<init>()V`: delegate to the base contract's initializer.
fn emit_constructor<E: CodeEmitter>(emitter: &mut E, base: &str) -> CodegenResult<()> {
    let sig = MethodSig::nullary_void();
    emitter.begin_method(Access::Public, INIT, &sig)?;
    emitter.load_local(locals::THIS)?;
    emitter.invoke(CallKind::Special, base, INIT, &sig)?;
    emitter.ret(ReturnKind::Void)?;
    emitter.end_method()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_presets() {
        let lookup = GeneratorOptions::default();
        assert_eq!(lookup.switch_strategy, SwitchStrategy::Lookup);
        assert_eq!(lookup.thunk_prefix, "m");
        assert_eq!(lookup.base_contract, "Reflector");

        let dense = GeneratorOptions::dense();
        assert_eq!(dense.switch_strategy, SwitchStrategy::Auto);
        assert_eq!(dense.thunk_prefix, "m");
    }
}
