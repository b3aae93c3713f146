use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Metrics error: {message}")]
    Metrics { message: String },

    #[error(transparent)]
    Firewall(#[from] crate::firewall::FirewallError),

    #[error(transparent)]
    Routing(#[from] crate::routing::RoutingError),

    #[error(transparent)]
    Nat(#[from] crate::nat::NatError),

    #[error(transparent)]
    Snapshot(#[from] crate::snapshot::SnapshotError),

    #[error(transparent)]
    Manager(#[from] crate::manager::ManagerError),

    #[error(transparent)]
    Security(#[from] crate::security::SecurityError),
}

impl Error {
    pub fn metrics(message: impl Into<String>) -> Self {
        Self::Metrics {
            message: message.into(),
        }
    }
}

/// Render an error followed by its sources, `outer: inner: root`.
pub fn display_chain(err: &dyn std::error::Error) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        // transparent wrappers repeat their inner message
        if !rendered.ends_with(&cause_text) {
            rendered.push_str(": ");
            rendered.push_str(&cause_text);
        }
        source = cause.source();
    }
    rendered
}
