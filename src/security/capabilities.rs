use caps::{CapSet, Capability};
use tracing::{debug, warn};

use super::{Result, SecurityError};

/// iptables needs CAP_NET_ADMIN to read or edit any table.
pub fn check_required_capabilities() -> Result<()> {
    debug!("Checking for required capabilities");

    if let Err(e) = check_capability(Capability::CAP_NET_ADMIN) {
        warn!("Current process capabilities:\n{}", list_current_capabilities());
        return Err(e);
    }

    debug!("All required capabilities are present");
    Ok(())
}

/// The capability must be both permitted and effective.
fn check_capability(cap: Capability) -> Result<()> {
    let cap_name = format!("{:?}", cap);

    let has_permitted = caps::has_cap(None, CapSet::Permitted, cap).map_err(|e| {
        SecurityError::capability_check(
            &cap_name,
            format!("Failed to check permitted capabilities: {}", e),
        )
    })?;

    if !has_permitted {
        return Err(SecurityError::missing_capability(
            &cap_name,
            "Permitted",
            "Grant the capability using: sudo setcap 'cap_net_admin=+ep' /path/to/natkeeper\n\
             Or run as root, since the iptables binary is invoked for every rule edit",
        ));
    }

    let has_effective = caps::has_cap(None, CapSet::Effective, cap).map_err(|e| {
        SecurityError::capability_check(
            &cap_name,
            format!("Failed to check effective capabilities: {}", e),
        )
    })?;

    if !has_effective {
        return Err(SecurityError::missing_capability(
            &cap_name,
            "Effective",
            "The capability is permitted but not effective.\n\
             Ensure it is raised before natkeeper starts (e.g. AmbientCapabilities in a systemd unit).",
        ));
    }

    debug!(capability = %cap_name, "Capability is permitted and effective");
    Ok(())
}

/// Human-readable listing of the process capability sets.
pub fn list_current_capabilities() -> String {
    let sets = [
        ("Permitted", CapSet::Permitted),
        ("Effective", CapSet::Effective),
        ("Inheritable", CapSet::Inheritable),
    ];

    let mut output = String::new();
    for (name, set) in sets {
        match caps::read(None, set) {
            Ok(caps) if caps.is_empty() => {
                output.push_str(&format!("{} capabilities: (none)\n", name))
            }
            Ok(caps) => {
                let mut names: Vec<String> = caps.iter().map(|c| format!("{:?}", c)).collect();
                names.sort();
                output.push_str(&format!("{} capabilities: {}\n", name, names.join(", ")));
            }
            Err(e) => output.push_str(&format!("{} capabilities: (error reading: {})\n", name, e)),
        }
    }
    output
}
