//! Shared value objects used by more than one aggregate.

mod location;

pub use location::Location;
