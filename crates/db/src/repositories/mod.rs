use thiserror::Error;

pub mod event;
pub mod order;
pub mod session;

pub use event::SqlEventRepository;
pub use order::SqlOrderGateway;
pub use session::SqlSessionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}
