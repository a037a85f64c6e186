//! Trait definitions, impl registrations, and obligation checking.
//!
//! The registry is program-wide: trait declarations and impls from every
//! processed module land here, and obligations queued during inference
//! are discharged against it once the types they mention have leaders.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ty::Ty;

/// The built-in equality trait, satisfied by the primitives.
pub const EQ_TRAIT: &str = "Eq";

/// A declared trait: its name and method signatures (generalized).
#[derive(Debug, Clone)]
pub struct TraitDef {
    pub name: String,
    /// Method name -> generalized signature.
    pub methods: Vec<(String, Ty)>,
}

/// Program-wide registry of traits and their impls.
///
/// Impls are keyed by the formatted leader-resolved target type, so
/// `impl Show for Vec(Int)` registers under `"Vec(Int)"` and an
/// obligation on a resolved `Vec(Int)` matches it.
#[derive(Debug, Default)]
pub struct TraitRegistry {
    traits: FxHashMap<String, TraitDef>,
    impls: FxHashSet<(String, String)>,
}

impl TraitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_trait(&mut self, def: TraitDef) {
        self.traits.insert(def.name.clone(), def);
    }

    pub fn get_trait(&self, name: &str) -> Option<&TraitDef> {
        self.traits.get(name)
    }

    /// Record `impl <trait_name> for <target>`.
    pub fn add_impl(&mut self, trait_name: &str, target: &Ty) {
        self.impls.insert((trait_name.to_string(), target.to_string()));
    }

    /// Whether the leader-resolved type satisfies the named trait.
    pub fn satisfies(&self, trait_name: &str, ty: &Ty) -> bool {
        if trait_name == EQ_TRAIT && builtin_eq(ty) {
            return true;
        }
        self.impls
            .contains(&(trait_name.to_string(), ty.to_string()))
    }
}

/// The primitives compare for equality without an impl.
fn builtin_eq(ty: &Ty) -> bool {
    matches!(ty, Ty::Int | Ty::Bool | Ty::Char | Ty::Unit | Ty::Never)
}
