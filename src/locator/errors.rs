use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("invalid locator name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("unknown locator strategy '{0}'")]
    UnknownStrategy(String),

    #[error("selector must be a single line: {0:?}")]
    InvalidSelector(String),

    #[error("I/O error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid UTF-8")]
    Utf8 { path: PathBuf },
}
