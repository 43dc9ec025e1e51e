use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListError {
    #[error("splice start {start} is past the end of a list of length {len}")]
    OutOfRange { start: usize, len: usize },
    #[error("derived lists are read-only")]
    ReadOnly,
    #[error("{0} is not implemented for observable lists")]
    NotImplemented(&'static str),
}
