use std::path::PathBuf;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors. Anything that is not listed here is reported as a
/// [`Diagnostic`](crate::diagnostics::Diagnostic) and generation carries on.
#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),
    ParseError { file: PathBuf, message: String },
    /// The configuration does not name a single location to scan.
    NoLocations,
    /// A configured location is syntactically unusable (e.g. empty).
    InvalidLocation(String),
    /// A configured location matches neither a path nor a module.
    UnknownLocation(String),
    /// The project root or a configuration file cannot be read.
    Unreadable { path: PathBuf, message: String },
    ConfigError(String),
    SerializationError(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "I/O error: {}", e),
            Error::ParseError { file, message } => {
                write!(f, "parse error in {}: {}", file.display(), message)
            }
            Error::NoLocations => write!(
                f,
                "no locations configured: at least one file, directory or module must be scanned"
            ),
            Error::InvalidLocation(location) => write!(f, "invalid location: {:?}", location),
            Error::UnknownLocation(location) => write!(
                f,
                "location {:?} matches neither a path under the project root nor a module",
                location
            ),
            Error::Unreadable { path, message } => {
                write!(f, "cannot read {}: {}", path.display(), message)
            }
            Error::ConfigError(msg) => write!(f, "invalid configuration: {}", msg),
            Error::SerializationError(msg) => write!(f, "serialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(format!("JSON: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::SerializationError(format!("YAML: {}", err))
    }
}

impl From<syn::Error> for Error {
    fn from(err: syn::Error) -> Self {
        Error::ParseError {
            file: PathBuf::from("<unknown>"),
            message: err.to_string(),
        }
    }
}
