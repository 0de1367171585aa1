pub mod auth;
pub mod authorization;
pub mod email;
pub mod item;
pub mod password_reset;
pub mod session;
pub mod token;

pub use auth::{AuthService, CredentialHasher};
pub use authorization::authorize_owner;
pub use email::EmailService;
pub use item::ItemService;
pub use password_reset::{PasswordResetService, ResetRequestOutcome, spawn_expired_ticket_sweeper};
pub use session::SessionResolver;
pub use token::TokenService;
