use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("embed: empty input")]
    EmptyInput,

    #[error("embed: API error: {0}")]
    Api(String),

    #[error("embed: unknown source {0:?}")]
    UnknownSource(String),

    #[error("embed: dimension mismatch: got {got}, want {want}")]
    DimensionMismatch { got: usize, want: usize },
}
