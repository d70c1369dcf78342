#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid container id: {0}")]
    InvalidContainerID(String),
    #[error("container name `{0}` does not match the naming convention")]
    NameMismatch(String),
}
pub type Result<T> = std::result::Result<T, Error>;
