use std::path::PathBuf;
use thiserror::Error;

/// Core error type for environment setup.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid registry URL '{url}': {source}")]
    InvalidRegistry {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Registry URL '{0}' has no host")]
    RegistryWithoutHost(String),

    #[error("can not resolve path {}", path.display())]
    CwdNotFound { path: PathBuf },
}
