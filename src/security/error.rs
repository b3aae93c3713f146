use thiserror::Error;

#[derive(Error, Debug)]
pub enum SecurityError {
    #[error(
        "Missing capability: {capability} in {capability_set} set\n\nRemediation:\n{remediation}"
    )]
    MissingCapability {
        capability: String,
        capability_set: String,
        remediation: String,
    },

    #[error("Capability check failed for {capability}: {message}")]
    CapabilityCheck { capability: String, message: String },
}

impl SecurityError {
    pub fn missing_capability(
        capability: impl Into<String>,
        capability_set: impl Into<String>,
        remediation: impl Into<String>,
    ) -> Self {
        Self::MissingCapability {
            capability: capability.into(),
            capability_set: capability_set.into(),
            remediation: remediation.into(),
        }
    }

    pub fn capability_check(capability: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CapabilityCheck {
            capability: capability.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SecurityError>;
