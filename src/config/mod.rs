pub mod schema;

pub use schema::{Config, RendererConfig, SessionsConfig, TelegramConfig};
