//! Gap slate text.
//!
//! A label is built from two absolute readings: where the coverage before
//! the gap ended and where the coverage after it resumed. Timeline offsets
//! never reach this module.

use chrono::Timelike;
use chronocam_timeline_model::settings::{LabelPreset, TimeFormatStyle};
use chronocam_timeline_model::time::AbsoluteTime;

const CLOCK_FORMAT: &str = "%H:%M:%S";
const CALENDAR_FORMAT: &str = "%a %d %b %Y %H:%M:%S";

/// Formats slate text for a preset and layout style.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelFormatter {
    preset: LabelPreset,
    style: TimeFormatStyle,
}

impl LabelFormatter {
    pub fn new(preset: LabelPreset, style: TimeFormatStyle) -> Self {
        Self { preset, style }
    }

    /// Slate text for a gap between `previous_end` and `next_start`.
    ///
    /// Lines are separated by `\n`.
    pub fn format(&self, previous_end: AbsoluteTime, next_start: AbsoluteTime) -> String {
        let label = self.preset.text();
        let secs = whole_seconds(previous_end, next_start);

        match self.style {
            TimeFormatStyle::TimeOnly => format!(
                "{label}\n{} to {}\nDuration: {}",
                previous_end.format(CLOCK_FORMAT),
                next_start.format(CLOCK_FORMAT),
                compact_duration(secs)
            ),
            TimeFormatStyle::DateTime => format!(
                "{label}: {} → {}  (Δ {})",
                previous_end.format(CALENDAR_FORMAT),
                next_start.format(CALENDAR_FORMAT),
                compact_duration(secs)
            ),
            TimeFormatStyle::DurationMultiline => format!(
                "{label}\n{} to {}\nTotal Duration = {}",
                previous_end.format(CLOCK_FORMAT),
                next_start.format(CLOCK_FORMAT),
                spelled_duration(secs)
            ),
        }
    }
}

/// Difference of the two readings as printed, both cut to the second.
fn whole_seconds(from: AbsoluteTime, to: AbsoluteTime) -> u64 {
    let printed = |t: AbsoluteTime| {
        let naive = t.as_naive();
        naive.with_nanosecond(0).unwrap_or(naive)
    };
    (printed(to) - printed(from)).num_seconds().max(0) as u64
}

/// `1h 2m 3s`; minutes are kept between hours and seconds.
fn compact_duration(total: u64) -> String {
    let (h, m, s) = split_hms(total);
    let mut parts = Vec::new();
    if h > 0 {
        parts.push(format!("{h}h"));
    }
    if m > 0 || (h > 0 && s > 0) {
        parts.push(format!("{m}m"));
    }
    parts.push(format!("{s}s"));
    parts.join(" ")
}

/// `1 hr 2 min 3 sec`; zero parts are dropped unless nothing else remains.
fn spelled_duration(total: u64) -> String {
    let (h, m, s) = split_hms(total);
    let mut parts = Vec::new();
    if h > 0 {
        parts.push(format!("{h} hr"));
    }
    if m > 0 {
        parts.push(format!("{m} min"));
    }
    if s > 0 || parts.is_empty() {
        parts.push(format!("{s} sec"));
    }
    parts.join(" ")
}

fn split_hms(total: u64) -> (u64, u64, u64) {
    (total / 3600, (total % 3600) / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> AbsoluteTime {
        AbsoluteTime::parse(s).unwrap()
    }

    #[test]
    fn test_time_only_layout() {
        let text = LabelFormatter::default()
            .format(t("2025-05-21T19:35:12"), t("2025-05-21T19:40:15"));
        assert_eq!(text, "GAP\n19:35:12 to 19:40:15\nDuration: 5m 3s");
    }

    #[test]
    fn test_duration_matches_printed_times() {
        let text = LabelFormatter::default()
            .format(t("2025-05-21T19:35:12.9"), t("2025-05-21T19:40:15.1"));
        assert_eq!(text, "GAP\n19:35:12 to 19:40:15\nDuration: 5m 3s");

        let text = LabelFormatter::default()
            .format(t("2025-05-21T19:35:12.1"), t("2025-05-21T19:35:12.9"));
        assert!(text.ends_with("Duration: 0s"));
    }

    #[test]
    fn test_date_time_layout_carries_calendar_date() {
        let text = LabelFormatter::new(LabelPreset::Gap, TimeFormatStyle::DateTime)
            .format(t("2025-05-21T19:35:12"), t("2025-05-21T19:40:15"));
        assert_eq!(
            text,
            "GAP: Wed 21 May 2025 19:35:12 → Wed 21 May 2025 19:40:15  (Δ 5m 3s)"
        );
    }

    #[test]
    fn test_multiline_layout_spells_out_duration() {
        let formatter = LabelFormatter::new(
            LabelPreset::NothingOfInterest,
            TimeFormatStyle::DurationMultiline,
        );
        assert_eq!(
            formatter.format(t("2025-05-21T19:35:12"), t("2025-05-21T19:40:15")),
            "Nothing of Interest\n19:35:12 to 19:40:15\nTotal Duration = 5 min 3 sec"
        );
        assert_eq!(
            formatter.format(t("2025-05-21T19:00:00"), t("2025-05-21T20:05:00")),
            "Nothing of Interest\n19:00:00 to 20:05:00\nTotal Duration = 1 hr 5 min"
        );
    }

    #[test]
    fn test_gap_across_midnight_keeps_both_dates() {
        let text = LabelFormatter::new(LabelPreset::Gap, TimeFormatStyle::DateTime)
            .format(t("2025-05-21T23:59:30"), t("2025-05-22T00:00:30"));
        assert!(text.contains("21 May 2025 23:59:30"));
        assert!(text.contains("22 May 2025 00:00:30"));
        assert!(text.ends_with("(Δ 1m 0s)"));
    }

    #[test]
    fn test_duration_helpers() {
        assert_eq!(compact_duration(0), "0s");
        assert_eq!(compact_duration(3605), "1h 0m 5s");
        assert_eq!(compact_duration(3600), "1h 0s");
        assert_eq!(spelled_duration(0), "0 sec");
        assert_eq!(spelled_duration(7200), "2 hr");
    }

    #[test]
    fn test_custom_label() {
        let text = LabelFormatter::new(
            LabelPreset::Custom("Camera Offline".to_string()),
            TimeFormatStyle::TimeOnly,
        )
        .format(t("2025-05-21T10:00:00"), t("2025-05-21T10:00:45"));
        assert!(text.starts_with("Camera Offline\n"));
        assert!(text.ends_with("Duration: 45s"));
    }
}
