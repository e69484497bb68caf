//! Courier aggregate and its storage places.

mod aggregate;
mod storage_place;

pub use aggregate::Courier;
pub use storage_place::StoragePlace;
