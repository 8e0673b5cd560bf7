//! Internal utilities.

pub mod freelist;
pub mod typedefs;
