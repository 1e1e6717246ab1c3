pub mod auth;
pub mod config;
pub mod listing;
pub mod response;
pub mod trading;

pub use auth::token_status;
pub use trading::TradingClient;
