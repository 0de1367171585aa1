pub mod item;
pub mod user;

pub use item::{CategoryCount, Item, ItemChanges, ItemOwner, ItemStats, NewItem};
pub use user::{NewUser, User};
