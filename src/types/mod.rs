//! Type definitions

pub mod column_map;
pub mod import;
pub mod lead;

pub use column_map::*;
pub use import::*;
pub use lead::*;
