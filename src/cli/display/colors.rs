//! Color theme for CLI output

use crate::domain::api::ConditionStatus;
use comfy_table::Color as TableColor;

#[derive(Debug, Clone)]
pub struct ColorTheme {
    pub success: TableColor,
    pub warning: TableColor,
    pub error: TableColor,
    pub info: TableColor,
    pub muted: TableColor,
}

impl Default for ColorTheme {
    fn default() -> Self {
        Self {
            success: TableColor::Green,
            warning: TableColor::Yellow,
            error: TableColor::Red,
            info: TableColor::Cyan,
            muted: TableColor::DarkGrey,
        }
    }
}

impl ColorTheme {
    /// Color for a condition. `positive` is false for conditions where
    /// True is bad news (Degraded).
    pub fn condition_color(&self, status: Option<ConditionStatus>, positive: bool) -> TableColor {
        match (status, positive) {
            (None, _) | (Some(ConditionStatus::Unknown), _) => self.muted,
            (Some(ConditionStatus::True), true) | (Some(ConditionStatus::False), false) => {
                self.success
            }
            _ => self.error,
        }
    }

    /// Color for the generation column: green once the latest spec was
    /// fully applied.
    pub fn generation_color(&self, observed: Option<i64>, generation: i64) -> TableColor {
        match observed {
            Some(observed) if observed >= generation => self.success,
            Some(_) => self.warning,
            None => self.muted,
        }
    }
}

pub fn table_color_to_colored_str(color: TableColor) -> &'static str {
    match color {
        TableColor::Green => "green",
        TableColor::Yellow => "yellow",
        TableColor::Red => "red",
        TableColor::Cyan => "cyan",
        TableColor::DarkGrey => "bright black",
        _ => "white",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_color() {
        let theme = ColorTheme::default();
        assert_eq!(
            theme.condition_color(Some(ConditionStatus::True), true),
            TableColor::Green
        );
        assert_eq!(
            theme.condition_color(Some(ConditionStatus::True), false),
            TableColor::Red
        );
        assert_eq!(
            theme.condition_color(Some(ConditionStatus::False), false),
            TableColor::Green
        );
        assert_eq!(theme.condition_color(None, true), TableColor::DarkGrey);
    }

    #[test]
    fn test_generation_color() {
        let theme = ColorTheme::default();
        assert_eq!(theme.generation_color(Some(3), 3), TableColor::Green);
        assert_eq!(theme.generation_color(Some(2), 3), TableColor::Yellow);
        assert_eq!(theme.generation_color(None, 1), TableColor::DarkGrey);
        assert_eq!(table_color_to_colored_str(TableColor::Yellow), "yellow");
    }
}
