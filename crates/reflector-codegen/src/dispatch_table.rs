// crates/reflector-codegen/src/dispatch_table.rs
//
// The dispatch entry point: switch on the token, call the matching routine,
// and send anything unmatched to the base contract's fallback.

use reflector_runtime::MethodSig;
use reflector_runtime::base::{INVOKE, NO_SUCH_METHOD};

use crate::emitter::{Access, CallKind, CodeEmitter, ReturnKind, locals};
use crate::errors::{CodegenError, CodegenResult};
use crate::index::DispatchIndex;

/// Minimum number of keys before a dense table is considered.
const MIN_TABLE_KEYS: usize = 4;

/// Maximum ratio of (key range / key count) for a table to count as dense.
const MAX_DENSITY_RATIO: f64 = 2.0;

/// How the token switch is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwitchStrategy {
    /// Sorted `(key, target)` pairs.
    #[default]
    Lookup,
    /// A jump table over `low..=high`; keys missing from the range go to the default.
    Table,
    /// `Table` when the keys are dense enough, `Lookup` otherwise.
    Auto,
}

impl SwitchStrategy {
    fn use_table(self, keys: &[i32]) -> bool {
        match self {
            SwitchStrategy::Lookup => false,
            SwitchStrategy::Table => !keys.is_empty(),
            SwitchStrategy::Auto => is_dense(keys),
        }
    }
}

/// Whether ascending `keys` are dense enough for a jump table.
pub fn is_dense(keys: &[i32]) -> bool {
    let (Some(&low), Some(&high)) = (keys.first(), keys.last()) else {
        return false;
    };
    if keys.len() < MIN_TABLE_KEYS {
        return false;
    }
    let range = (high as i64 - low as i64 + 1) as f64;
    range / keys.len() as f64 <= MAX_DENSITY_RATIO
}

/// Emit the public `invoke` routine. `thunks[i]` names the routine for the
/// descriptor at position `i`; `unit` is the name of the unit being built.
pub fn emit_dispatch_entry<E: CodeEmitter>(
    emitter: &mut E,
    unit: &str,
    index: &DispatchIndex,
    thunks: &[String],
    strategy: SwitchStrategy,
) -> CodegenResult<()> {
    if thunks.len() != index.len() {
        return Err(CodegenError::type_mismatch(
            "dispatch routines",
            format!("{} routine names", index.len()),
            thunks.len().to_string(),
        ));
    }
    let sig = MethodSig::dispatch();
    emitter.begin_method(Access::Public, INVOKE, &sig)?;

    // Operands for whichever routine the switch selects.
    emitter.load_local(locals::THIS)?;
    emitter.load_local(locals::TOKEN)?;
    emitter.load_local(locals::RECEIVER)?;
    emitter.load_local(locals::ARGUMENTS)?;

    emitter.load_local(locals::TOKEN)?;
    let default = emitter.new_label();
    let cases: Vec<(i32, E::Label)> = index
        .entries()
        .iter()
        .map(|entry| (entry.token.key(), emitter.new_label()))
        .collect();
    emit_switch(emitter, strategy, default, &cases)?;

    for (entry, &(_, label)) in index.entries().iter().zip(&cases) {
        emitter.place_label(label)?;
        emitter.invoke(CallKind::Special, unit, &thunks[entry.position], &sig)?;
        emitter.ret(ReturnKind::Reference)?;
    }

    emitter.place_label(default)?;
    emitter.invoke(CallKind::Virtual, unit, NO_SUCH_METHOD, &sig)?;
    emitter.ret(ReturnKind::Reference)?;
    emitter.end_method()
}

fn emit_switch<E: CodeEmitter>(
    emitter: &mut E,
    strategy: SwitchStrategy,
    default: E::Label,
    cases: &[(i32, E::Label)],
) -> CodegenResult<()> {
    let keys: Vec<i32> = cases.iter().map(|(key, _)| *key).collect();
    if !strategy.use_table(&keys) {
        tracing::trace!(cases = cases.len(), "lookup switch");
        return emitter.lookup_switch(default, cases);
    }

    // Keys ascend; fill gaps in low..=high with the default.
    let (low, high) = (keys[0], keys[keys.len() - 1]);
    let mut targets = Vec::with_capacity((high as i64 - low as i64 + 1) as usize);
    let mut next = cases.iter().peekable();
    for key in low..=high {
        match next.peek() {
            Some(&&(case_key, label)) if case_key == key => {
                targets.push(label);
                next.next();
            }
            _ => targets.push(default),
        }
    }
    tracing::trace!(low, high, "table switch");
    emitter.table_switch(low, default, &targets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn density() {
        assert!(is_dense(&[1, 2, 3, 4]));
        assert!(is_dense(&[1, 2, 3, 8]));
        assert!(!is_dense(&[1, 2, 3, 9]));
        assert!(!is_dense(&[1, 2, 3]));
        assert!(!is_dense(&[]));
    }

    #[test]
    fn strategy_selection() {
        let contiguous = [1, 2, 3, 4, 5];
        assert!(!SwitchStrategy::Lookup.use_table(&contiguous));
        assert!(SwitchStrategy::Table.use_table(&contiguous));
        assert!(SwitchStrategy::Auto.use_table(&contiguous));
        assert!(SwitchStrategy::Table.use_table(&[1]));
        assert!(!SwitchStrategy::Table.use_table(&[]));
        assert!(!SwitchStrategy::Auto.use_table(&[1, 2]));
    }
}
