//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values; two
/// with the same values are the same value. `Money` is the canonical example
/// here: a balance of 100.00 is indistinguishable from any other 100.00.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
