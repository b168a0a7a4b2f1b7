//! Data models

pub mod appointment;
pub mod feedback;
pub mod plant;
pub mod prediction;
pub mod profile;
pub mod stats;

pub use appointment::*;
pub use feedback::*;
pub use plant::PlantInfo;
pub use prediction::*;
pub use profile::*;
pub use stats::SystemStats;

use chrono::{SecondsFormat, Utc};

/// Current UTC time as RFC 3339 text with microseconds, so stored
/// timestamps sort lexically in chronological order
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_have_fixed_width() {
        let ts = now_timestamp();
        assert_eq!(ts.len(), "2024-01-01T00:00:00.000000Z".len());
        assert!(ts.ends_with('Z'));
    }
}
