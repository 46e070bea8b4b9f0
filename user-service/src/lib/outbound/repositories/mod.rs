pub mod memory;
pub mod refresh_token;
pub mod user;

pub use memory::InMemoryRefreshTokenStore;
pub use memory::InMemoryUserDirectory;
pub use refresh_token::PostgresRefreshTokenStore;
pub use user::PostgresUserDirectory;
