#[cfg(target_os = "linux")]
pub mod capabilities;

pub mod error;

pub use error::{Result, SecurityError};

/// Check that the process may edit the kernel firewall.
pub fn check_capabilities() -> Result<()> {
    #[cfg(target_os = "linux")]
    {
        capabilities::check_required_capabilities()?;
    }

    #[cfg(not(target_os = "linux"))]
    {
        tracing::debug!("Capability checking is only available on Linux");
    }

    Ok(())
}
