pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unknown {kind}: {value:?}")]
    UnknownVariant {
        kind: &'static str,
        value: String,
    },
}
