use thiserror::Error;

use crate::ids::NodeKey;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("tree is not traversable: no parent reference column configured")]
    NotTraversable,
    #[error("parent not found: {0}")]
    ParentNotFound(NodeKey),
    #[error("corrupt hierarchy: {0}")]
    CorruptHierarchy(String),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    #[error("inconsistent state: {0}")]
    InconsistentState(String),
}
