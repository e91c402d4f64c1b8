use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("bind failed: {0}")]
    Bind(#[source] std::io::Error),

    #[error("server is already open")]
    AlreadyOpen,

    #[error("server is not open")]
    NotOpen,
}
