//! SQLite persistence for ticketry: pool construction, embedded migrations
//! and the repository layer over events, orders and conversation sessions.

pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use repositories::{
    RepositoryError, SqlEventRepository, SqlOrderGateway, SqlSessionRepository,
};
