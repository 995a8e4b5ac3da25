//! Graph traversal over the items children table.

pub mod closure;
pub mod cycles;
pub mod hierarchy;
