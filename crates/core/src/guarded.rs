//! Guarded-default values.
//!
//! Some derived figures (cost per base unit, cost per serving, budget utilisation)
//! depend on catalog data that may be incomplete. Instead of failing, the
//! computation substitutes a safe default and marks the result approximate.
//! Cost figures are advisory, so this path never aborts.

use serde::{Deserialize, Serialize};

/// Why a guarded default was substituted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardReason {
    /// A pack/box material has no `units_per_pack`; `1` was used.
    MissingUnitsPerPack,
    /// A pack/box material has `units_per_pack <= 0`; `1` was used.
    NonPositiveUnitsPerPack,
    /// A recipe has `serving_size <= 0`; the total was used as the per-serving figure.
    NonPositiveServingSize,
    /// A budget allocates nothing; utilisation was reported as zero.
    ZeroBudget,
}

impl core::fmt::Display for GuardReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            GuardReason::MissingUnitsPerPack => "units per pack missing",
            GuardReason::NonPositiveUnitsPerPack => "units per pack not positive",
            GuardReason::NonPositiveServingSize => "serving size not positive",
            GuardReason::ZeroBudget => "budget total is zero",
        };
        f.write_str(s)
    }
}

/// A value that may have been produced by a guarded default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guarded<T> {
    value: T,
    guard: Option<GuardReason>,
}

impl<T> Guarded<T> {
    /// A value computed from complete inputs.
    pub fn exact(value: T) -> Self {
        Self { value, guard: None }
    }

    /// A value produced by substituting a default; logged at `warn`.
    pub fn approximate(value: T, reason: GuardReason) -> Self {
        tracing::warn!(reason = %reason, "guarded default substituted");
        Self {
            value,
            guard: Some(reason),
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn is_approximate(&self) -> bool {
        self.guard.is_some()
    }

    pub fn reason(&self) -> Option<GuardReason> {
        self.guard
    }

    /// Transform the value, keeping the guard flag.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Guarded<U> {
        Guarded {
            value: f(self.value),
            guard: self.guard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_values_carry_no_reason() {
        let g = Guarded::exact(5);
        assert!(!g.is_approximate());
        assert_eq!(g.reason(), None);
        assert_eq!(*g.value(), 5);
    }

    #[test]
    fn map_keeps_the_guard() {
        let g = Guarded::approximate(10, GuardReason::NonPositiveServingSize).map(|v| v * 2);
        assert_eq!(g.into_value(), 20);
        let g = Guarded::approximate(1, GuardReason::MissingUnitsPerPack).map(|v| v + 1);
        assert_eq!(g.reason(), Some(GuardReason::MissingUnitsPerPack));
    }
}
