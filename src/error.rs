use thiserror::Error;

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Unresolvable topology: {0}")]
    UnresolvableTopology(String),
}

pub type Result<T> = std::result::Result<T, MergeError>;
