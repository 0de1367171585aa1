pub mod health;
pub mod items;
pub mod login;
pub mod me;
pub mod password_reset;
pub mod signup;

pub use health::{health_check, root};
pub use items::{
    create_item, delete_item, get_item, item_stats, list_items, replace_item, update_item,
};
pub use login::login;
pub use me::me;
pub use password_reset::{forgot_password, reset_password};
pub use signup::signup;
