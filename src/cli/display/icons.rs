//! Status icons for CLI output

use crate::domain::api::ConditionStatus;

pub struct StatusIcon;

impl StatusIcon {
    pub const SUCCESS: &'static str = "✓";

    pub const WARNING: &'static str = "⚠";

    pub const ERROR: &'static str = "✗";

    /// Progressing rollout
    pub const PENDING: &'static str = "⏳";

    pub const UNKNOWN: &'static str = "?";

    /// Icon for a condition. `positive` is false for conditions where True
    /// is bad news.
    pub fn condition_icon(status: Option<ConditionStatus>, positive: bool) -> &'static str {
        match (status, positive) {
            (None, _) | (Some(ConditionStatus::Unknown), _) => Self::UNKNOWN,
            (Some(ConditionStatus::True), true) | (Some(ConditionStatus::False), false) => {
                Self::SUCCESS
            }
            _ => Self::ERROR,
        }
    }

    /// Overall state from Available and Degraded.
    pub fn get_status_text(available: bool, degraded: bool) -> &'static str {
        match (available, degraded) {
            (true, false) => "Available",
            (true, true) => "Degraded",
            (false, true) => "Failed",
            (false, false) => "Progressing",
        }
    }

    pub fn get_status_icon(available: bool, degraded: bool) -> &'static str {
        match (available, degraded) {
            (true, false) => Self::SUCCESS,
            (true, true) => Self::WARNING,
            (false, true) => Self::ERROR,
            (false, false) => Self::PENDING,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_icon() {
        assert_eq!(
            StatusIcon::condition_icon(Some(ConditionStatus::True), true),
            StatusIcon::SUCCESS
        );
        assert_eq!(
            StatusIcon::condition_icon(Some(ConditionStatus::True), false),
            StatusIcon::ERROR
        );
        assert_eq!(StatusIcon::condition_icon(None, true), StatusIcon::UNKNOWN);
    }

    #[test]
    fn test_get_status_text() {
        assert_eq!(StatusIcon::get_status_text(true, false), "Available");
        assert_eq!(StatusIcon::get_status_text(true, true), "Degraded");
        assert_eq!(StatusIcon::get_status_text(false, true), "Failed");
        assert_eq!(StatusIcon::get_status_text(false, false), "Progressing");
        assert_eq!(StatusIcon::get_status_icon(false, false), StatusIcon::PENDING);
    }
}
