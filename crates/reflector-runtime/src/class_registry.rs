// crates/reflector-runtime/src/class_registry.rs
//
// Class and interface hierarchy used for reference narrowing and for
// selecting the receiver's implementation of a virtual or interface call.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::sync::Arc;

use crate::types::{PrimitiveType, TypeRef, well_known};
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub name: Arc<str>,
    /// `None` only for the root class and for interfaces.
    pub superclass: Option<Arc<str>>,
    /// Implemented interfaces, or extended interfaces for an interface.
    pub interfaces: SmallVec<[Arc<str>; 2]>,
    pub is_interface: bool,
}

#[derive(Debug, Clone)]
pub struct ClassRegistry {
    classes: FxHashMap<Arc<str>, ClassInfo>,
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassRegistry {
    /// A registry pre-populated with the builtin value classes.
    pub fn new() -> Self {
        let mut registry = Self {
            classes: FxHashMap::default(),
        };
        registry.insert(well_known::OBJECT, None, &[], false);
        registry.define_interface(well_known::CHAR_SEQUENCE, &[]);
        registry.define_interface(well_known::COMPARABLE, &[]);
        registry.define_class(well_known::NUMBER, None, &[]);
        for boxed in [
            well_known::BYTE,
            well_known::SHORT,
            well_known::INTEGER,
            well_known::LONG,
            well_known::FLOAT,
            well_known::DOUBLE,
        ] {
            registry.define_class(boxed, Some(well_known::NUMBER), &[well_known::COMPARABLE]);
        }
        registry.define_class(well_known::BOOLEAN, None, &[well_known::COMPARABLE]);
        registry.define_class(well_known::CHARACTER, None, &[well_known::COMPARABLE]);
        registry.define_class(
            well_known::STRING,
            None,
            &[well_known::CHAR_SEQUENCE, well_known::COMPARABLE],
        );
        registry
    }

    /// Define (or redefine) a class. A missing superclass means `Object`.
    pub fn define_class(&mut self, name: &str, superclass: Option<&str>, interfaces: &[&str]) {
        let superclass = superclass.unwrap_or(well_known::OBJECT);
        self.insert(name, Some(superclass), interfaces, false);
    }

    pub fn define_interface(&mut self, name: &str, extends: &[&str]) {
        self.insert(name, None, extends, true);
    }

    fn insert(&mut self, name: &str, superclass: Option<&str>, interfaces: &[&str], is_interface: bool) {
        let name: Arc<str> = Arc::from(name);
        let info = ClassInfo {
            name: name.clone(),
            superclass: superclass.map(Arc::from),
            interfaces: interfaces.iter().map(|i| Arc::from(*i)).collect(),
            is_interface,
        };
        self.classes.insert(name, info);
    }

    pub fn get(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.get(name)
    }

    pub fn is_interface(&self, name: &str) -> bool {
        self.get(name).is_some_and(|info| info.is_interface)
    }

    /// `name`, then its superclasses up to the root. Interfaces are not included.
    pub fn superclass_chain<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        let mut next = Some(name);
        std::iter::from_fn(move || {
            let current = next?;
            next = self
                .get(current)
                .and_then(|info| info.superclass.as_deref());
            Some(current)
        })
    }

    /// Reflexive, transitive subtype check over superclasses and interfaces.
    pub fn is_subtype(&self, sub: &str, sup: &str) -> bool {
        if sub == sup || sup == well_known::OBJECT {
            return true;
        }
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut pending: SmallVec<[&str; 8]> = SmallVec::new();
        pending.push(sub);
        while let Some(current) = pending.pop() {
            if !seen.insert(current) {
                continue;
            }
            if current == sup {
                return true;
            }
            if let Some(info) = self.get(current) {
                if let Some(parent) = info.superclass.as_deref() {
                    pending.push(parent);
                }
                pending.extend(info.interfaces.iter().map(|i| &**i));
            }
        }
        false
    }

    /// Whether `value` may be held in a slot of type `ty`. Null fits every
    /// reference type; primitive and void types hold no references at all.
    pub fn is_instance(&self, value: &Value, ty: &TypeRef) -> bool {
        match ty {
            TypeRef::Void | TypeRef::Primitive(_) => false,
            _ if value.is_null() => true,
            TypeRef::Class(name) => value
                .runtime_class()
                .is_some_and(|class| self.is_subtype(class, name)),
            TypeRef::Array(element) => match (value.as_array(), element.as_primitive()) {
                (Some(items), Some(p)) => items.iter().all(|item| admits_primitive(item, p)),
                (Some(items), None) => {
                    element.is_object() || items.iter().all(|item| self.is_instance(item, element))
                }
                (None, _) => false,
            },
        }
    }
}

/// Whether `item` can stand in a primitive array slot of type `p`: the same
/// boxed values unboxing accepts, so no nulls.
fn admits_primitive(item: &Value, p: PrimitiveType) -> bool {
    item.as_boxed_primitive().is_some_and(|boxed| {
        item.runtime_class() == Some(p.wrapper_class())
            || (p.is_numeric() && boxed.ty().is_numeric())
    })
}
