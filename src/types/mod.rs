//! Core data types: display items, upstream input items and stream events.

pub mod event;
pub mod item;
pub mod upstream;

pub use event::{OutputItem, StreamEvent, StreamRecord};
pub use item::*;
pub use upstream::*;
