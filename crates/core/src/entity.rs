//! Entity trait for catalog reference data (identity without an event stream).

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Display name used in reports and error messages.
    fn name(&self) -> &str;

    /// Inactive entities stay resolvable but take no part in new operations.
    fn is_active(&self) -> bool {
        true
    }
}
