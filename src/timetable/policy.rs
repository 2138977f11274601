//! Tunable rules. The load thresholds and the auto-fill tie-break are
//! reconstructed from how the admin screens read the results, so they are
//! settings rather than constants.

use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetablePolicy {
    /// Range groups tried between the exact grade and "all", in order.
    pub grade_ranges: Vec<String>,
    pub default_max_periods_per_week: u32,
    /// Load below this percentage is "underutilized".
    pub underutilized_below_pct: u32,
    /// Load above this percentage is "overloaded".
    pub optimal_max_pct: u32,
    /// Overload above this percentage of capacity is an error, not a warning.
    pub overload_error_pct: u32,
    /// Manual edits must name a teacher.
    pub require_teacher: bool,
    /// Start the auto-fill running tally from each teacher's existing
    /// school-wide load instead of zero.
    pub seed_running_load: bool,
}

impl Default for TimetablePolicy {
    fn default() -> Self {
        Self {
            grade_ranges: vec!["1-5".to_string(), "6-10".to_string(), "11-12".to_string()],
            default_max_periods_per_week: 30,
            underutilized_below_pct: 40,
            optimal_max_pct: 100,
            overload_error_pct: 150,
            require_teacher: false,
            seed_running_load: false,
        }
    }
}

fn positive_u32(obj: &Map<String, Value>, key: &str) -> Option<u32> {
    obj.get(key)
        .and_then(|v| v.as_u64())
        .filter(|v| *v > 0)
        .and_then(|v| u32::try_from(v).ok())
}

impl TimetablePolicy {
    /// Reads the `setup.timetable` object. Missing or malformed keys keep
    /// their defaults.
    pub fn from_settings(obj: &Map<String, Value>) -> Self {
        let d = Self::default();
        let grade_ranges = obj
            .get("gradeRanges")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .unwrap_or(d.grade_ranges);
        let underutilized_below_pct =
            positive_u32(obj, "underutilizedBelowPct").unwrap_or(d.underutilized_below_pct);
        let optimal_max_pct = positive_u32(obj, "optimalMaxPct")
            .filter(|v| *v >= underutilized_below_pct)
            .unwrap_or(d.optimal_max_pct.max(underutilized_below_pct));
        let overload_error_pct = positive_u32(obj, "overloadErrorPct")
            .filter(|v| *v >= optimal_max_pct)
            .unwrap_or(d.overload_error_pct.max(optimal_max_pct));
        Self {
            grade_ranges,
            default_max_periods_per_week: positive_u32(obj, "defaultMaxPeriodsPerWeek")
                .unwrap_or(d.default_max_periods_per_week),
            underutilized_below_pct,
            optimal_max_pct,
            overload_error_pct,
            require_teacher: obj
                .get("requireTeacher")
                .and_then(|v| v.as_bool())
                .unwrap_or(d.require_teacher),
            seed_running_load: obj
                .get("seedRunningLoad")
                .and_then(|v| v.as_bool())
                .unwrap_or(d.seed_running_load),
        }
    }
}

/// Shape of a generated "standard day" of periods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardDaySpec {
    pub periods_per_day: u8,
    pub period_minutes: u32,
    pub day_start: String,
    /// Period number that is a break; 0 for none.
    pub break_period: u8,
    pub break_name: String,
}

impl Default for StandardDaySpec {
    fn default() -> Self {
        Self {
            periods_per_day: 8,
            period_minutes: 45,
            day_start: "08:00".to_string(),
            break_period: 4,
            break_name: "Lunch Break".to_string(),
        }
    }
}

impl StandardDaySpec {
    pub fn from_settings(obj: &Map<String, Value>) -> Self {
        let d = Self::default();
        Self {
            periods_per_day: positive_u32(obj, "periodsPerDay")
                .and_then(|v| u8::try_from(v).ok())
                .unwrap_or(d.periods_per_day),
            period_minutes: positive_u32(obj, "periodMinutes")
                .filter(|v| *v <= 240)
                .unwrap_or(d.period_minutes),
            day_start: obj
                .get("dayStart")
                .and_then(|v| v.as_str())
                .filter(|s| chrono::NaiveTime::parse_from_str(s, "%H:%M").is_ok())
                .map(|s| s.to_string())
                .unwrap_or(d.day_start),
            break_period: obj
                .get("breakPeriod")
                .and_then(|v| v.as_u64())
                .and_then(|v| u8::try_from(v).ok())
                .unwrap_or(d.break_period),
            break_name: obj
                .get("breakName")
                .and_then(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(d.break_name),
        }
    }
}
