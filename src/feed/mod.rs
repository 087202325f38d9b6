pub mod item;
pub mod store;

pub use item::{Item, ItemKind};
pub use store::ItemStore;
