pub mod item;
pub mod memory;
pub mod user;

pub use item::{ItemQuery, ItemRepository, PgItemRepository, SortKey, SortOrder};
pub use memory::InMemoryStore;
pub use user::{PgUserRepository, UserRepository};
