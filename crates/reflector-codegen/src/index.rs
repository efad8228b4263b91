// crates/reflector-codegen/src/index.rs
//
// Token assignment: one contiguous, 1-based token per descriptor in list order.

use crate::descriptor::{DispatchToken, MethodDescriptor};
use crate::errors::{CodegenError, CodegenResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchEntry {
    pub token: DispatchToken,
    /// Position of the descriptor in the list the index was built from.
    pub position: usize,
}

/// The token assignment for one descriptor list, in list order.
///
/// This is the explicit form of the tokens written into the descriptors and
/// is what the table and thunk builders consume.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchIndex {
    entries: Vec<DispatchEntry>,
}

impl DispatchIndex {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[DispatchEntry] {
        &self.entries
    }

    pub fn token_at(&self, position: usize) -> Option<DispatchToken> {
        self.entries.get(position).map(|e| e.token)
    }

    /// Position of the descriptor holding `token`.
    pub fn position_of(&self, token: DispatchToken) -> Option<usize> {
        self.entries
            .binary_search_by_key(&token, |e| e.token)
            .ok()
            .map(|i| self.entries[i].position)
    }

    /// Switch keys, ascending.
    pub fn keys(&self) -> Vec<i32> {
        self.entries.iter().map(|e| e.token.key()).collect()
    }
}

/// Write `position + 1` into every descriptor's token and return the mapping.
///
/// Re-running on the same list reproduces the same tokens.
pub fn assign_tokens(descriptors: &mut [MethodDescriptor]) -> CodegenResult<DispatchIndex> {
    let count = descriptors.len();
    let mut entries = Vec::with_capacity(count);
    for (position, descriptor) in descriptors.iter_mut().enumerate() {
        let token = DispatchToken::for_position(position)
            .ok_or_else(|| CodegenError::too_many_methods(count))?;
        descriptor.set_dispatch_token(token);
        entries.push(DispatchEntry { token, position });
    }
    tracing::trace!(count, "assigned dispatch tokens");
    Ok(DispatchIndex { entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflector_runtime::TypeRef;

    fn methods(n: usize) -> Vec<MethodDescriptor> {
        (0..n)
            .map(|i| MethodDescriptor::instance("Widget", format!("m{}", i), [], TypeRef::Void))
            .collect()
    }

    #[test]
    fn tokens_follow_list_order() {
        let mut list = methods(5);
        let index = assign_tokens(&mut list).unwrap();
        for (i, m) in list.iter().enumerate() {
            assert_eq!(m.dispatch_key(), i as i32 + 1);
            assert_eq!(index.token_at(i), m.dispatch_token());
        }
        assert_eq!(index.keys(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn empty_list_yields_empty_index() {
        let index = assign_tokens(&mut []).unwrap();
        assert!(index.is_empty());
        assert!(index.keys().is_empty());
    }

    #[test]
    fn reassignment_is_idempotent() {
        let mut list = methods(3);
        let first = assign_tokens(&mut list).unwrap();
        let tokens: Vec<_> = list.iter().map(|m| m.dispatch_token()).collect();
        let second = assign_tokens(&mut list).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            tokens,
            list.iter().map(|m| m.dispatch_token()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn position_lookup() {
        let mut list = methods(4);
        let index = assign_tokens(&mut list).unwrap();
        let token = DispatchToken::new(3).unwrap();
        assert_eq!(index.position_of(token), Some(2));
        assert_eq!(index.position_of(DispatchToken::new(9).unwrap()), None);
    }
}
