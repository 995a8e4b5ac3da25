//! Item types stored in the authorization graph.

pub mod item;

pub use item::{Item, ItemType, ParseItemTypeError};
