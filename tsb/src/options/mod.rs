//! Layered option resolution
//!
//! Options are merged shallowly and right-biased: a value present in the
//! override wins, an absent one leaves the base untouched. Merges always
//! produce a new value so shared presets are never mutated.

mod tsc;
mod tslint;

pub use tsc::{CompilerOptions, DEFAULT_PROJECT, DEV, PROD};
pub use tslint::{DEFAULT_TSLINT, TslintConfig, TslintOptions};

/// Right-biased shallow merge
pub trait Merge: Clone {
    /// Return `self` overlaid with every value `over` defines
    fn merge(&self, over: &Self) -> Self;
}

/// Merge an optional override onto a base, copying the base when absent
pub fn merge_options<T: Merge>(base: &T, over: Option<&T>) -> T {
    match over {
        Some(over) => base.merge(over),
        None => base.clone(),
    }
}

/// Fold several optional tiers onto a base, left to right
pub fn merge_tiers<'a, T: Merge + 'a>(base: &T, tiers: impl IntoIterator<Item = Option<&'a T>>) -> T {
    tiers
        .into_iter()
        .fold(base.clone(), |acc, tier| merge_options(&acc, tier))
}
