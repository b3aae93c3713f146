use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RoutingError>;

#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("missing default route")]
    MissingDefaultRoute,

    #[error("route list: {message}")]
    RouteList {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Malformed route entry at {}:{line}: {reason}", path.display())]
    MalformedRoute {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("default route missing interface: no link with index {index}{}", .reason.as_ref().map(|r| format!(" ({})", r)).unwrap_or_default())]
    LinkNotFound { index: u32, reason: Option<String> },
}

impl RoutingError {
    pub fn route_list(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::RouteList {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn malformed(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedRoute {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }

    pub fn link_not_found(index: u32) -> Self {
        Self::LinkNotFound {
            index,
            reason: None,
        }
    }

    pub fn link_lookup_failed(index: u32, reason: impl Into<String>) -> Self {
        Self::LinkNotFound {
            index,
            reason: Some(reason.into()),
        }
    }
}
