#[derive(Debug, thiserror::Error)]
pub enum CrawlerError {
    #[error("Database error")]
    Database(#[from] sqlx::error::Error),
    #[error("HTTP client error")]
    Http(#[from] reqwest::Error),
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}
