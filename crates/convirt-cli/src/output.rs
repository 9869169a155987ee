//! Formatted output helpers for CLI commands.

use convirt_domain::info::DomainState;

/// Formats a KiB amount into a human-readable string (e.g., "128.0 MiB").
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_memory(kib: u64) -> String {
    const MIB: u64 = 1024;
    const GIB: u64 = MIB * 1024;

    if kib == 0 {
        "-".to_string()
    } else if kib >= GIB {
        format!("{:.1} GiB", kib as f64 / GIB as f64)
    } else if kib >= MIB {
        format!("{:.1} MiB", kib as f64 / MIB as f64)
    } else {
        format!("{kib} KiB")
    }
}

/// Short label of a domain state.
#[must_use]
pub const fn domain_state(state: DomainState) -> &'static str {
    match state {
        DomainState::NoState => "unknown",
        DomainState::Running => "running",
        DomainState::Shutoff => "shutoff",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_memory_unset() {
        assert_eq!(format_memory(0), "-");
    }

    #[test]
    fn format_memory_displays_kib() {
        assert_eq!(format_memory(512), "512 KiB");
    }

    #[test]
    fn format_memory_displays_mib() {
        assert_eq!(format_memory(131_072), "128.0 MiB");
    }

    #[test]
    fn format_memory_displays_gib() {
        assert_eq!(format_memory(2_097_152), "2.0 GiB");
    }

    #[test]
    fn states_have_labels() {
        assert_eq!(domain_state(DomainState::Running), "running");
        assert_eq!(domain_state(DomainState::Shutoff), "shutoff");
    }
}
