use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid record ID: {0}")]
    InvalidId(String),
}
