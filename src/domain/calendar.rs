//! Exam calendar: the per-day slot template, the exam window and the
//! department/period scope a generation run covers.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedError};
use crate::id::scope_key;

/// Fixed set of same-length time windows repeated every exam day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotTemplate {
    /// Slot start times in chronological order, "HH:MM"
    #[serde(with = "hhmm")]
    pub starts: Vec<NaiveTime>,
    /// Length of every slot in minutes
    pub duration_minutes: u32,
}

impl Default for SlotTemplate {
    fn default() -> Self {
        let starts = [(8, 30), (11, 0), (13, 30), (16, 0)]
            .into_iter()
            .filter_map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0))
            .collect();
        Self {
            starts,
            duration_minutes: 90,
        }
    }
}

impl SlotTemplate {
    pub fn new(starts: Vec<NaiveTime>, duration_minutes: u32) -> Self {
        Self {
            starts,
            duration_minutes,
        }
    }

    /// Build a template of `count` back-to-back slots starting at `first`
    pub fn uniform(first: NaiveTime, count: usize, duration_minutes: u32) -> Self {
        let starts = (0..count)
            .map(|i| first + Duration::minutes(i as i64 * duration_minutes as i64))
            .collect();
        Self {
            starts,
            duration_minutes,
        }
    }

    pub fn slots_per_day(&self) -> usize {
        self.starts.len()
    }

    pub fn start_of(&self, slot: usize) -> Option<NaiveTime> {
        self.starts.get(slot).copied()
    }

    /// Slots whose time range intersects `[start, start + minutes)`
    pub fn slots_overlapping(&self, start: NaiveTime, minutes: u32) -> Vec<usize> {
        let end = start + Duration::minutes(minutes as i64);
        let length = Duration::minutes(self.duration_minutes as i64);
        self.starts
            .iter()
            .enumerate()
            .filter(|(_, s)| **s < end && start < **s + length)
            .map(|(i, _)| i)
            .collect()
    }

    /// Rejects empty templates, zero durations and overlapping slots
    pub fn validate(&self) -> Result<()> {
        if self.starts.is_empty() {
            return Err(SchedError::Configuration("slot template has no slots".into()));
        }
        if self.duration_minutes == 0 {
            return Err(SchedError::Configuration("slot duration must be positive".into()));
        }
        let length = Duration::minutes(self.duration_minutes as i64);
        for pair in self.starts.windows(2) {
            if pair[0] + length > pair[1] {
                return Err(SchedError::Configuration(format!(
                    "slots starting at {} and {} overlap",
                    pair[0].format("%H:%M"),
                    pair[1].format("%H:%M")
                )));
            }
        }
        Ok(())
    }
}

/// The run of exam days a generation covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamWindow {
    pub start: NaiveDate,
    pub days: u32,
    /// Saturdays and Sundays are not counted as exam days
    #[serde(default)]
    pub skip_weekends: bool,
}

impl ExamWindow {
    pub fn new(start: NaiveDate, days: u32) -> Self {
        Self {
            start,
            days,
            skip_weekends: false,
        }
    }

    pub fn skipping_weekends(mut self, skip: bool) -> Self {
        self.skip_weekends = skip;
        self
    }

    /// Calendar dates of every exam day, in order
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates = Vec::with_capacity(self.days as usize);
        let mut current = self.start;
        while dates.len() < self.days as usize {
            let weekend = matches!(current.weekday(), Weekday::Sat | Weekday::Sun);
            if !(self.skip_weekends && weekend) {
                dates.push(current);
            }
            current += Duration::days(1);
        }
        dates
    }

    pub fn last_day(&self) -> NaiveDate {
        self.dates().last().copied().unwrap_or(self.start)
    }
}

/// The next Monday strictly after `today`
pub fn next_monday(today: NaiveDate) -> NaiveDate {
    let ahead = 7 - today.weekday().num_days_from_monday() as i64;
    today + Duration::days(ahead)
}

/// Departments and period a generation job owns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    /// Included departments; empty means every department
    pub departments: Vec<String>,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
}

impl Scope {
    pub fn new(mut departments: Vec<String>, first_day: NaiveDate, last_day: NaiveDate) -> Self {
        departments.sort();
        departments.dedup();
        Self {
            departments,
            first_day,
            last_day,
        }
    }

    pub fn for_window(departments: Vec<String>, window: &ExamWindow) -> Self {
        Self::new(departments, window.start, window.last_day())
    }

    pub fn includes_department(&self, department: &str) -> bool {
        self.departments.is_empty() || self.departments.iter().any(|d| d == department)
    }

    /// Whether an exam of `department` on `date` belongs to this scope
    pub fn covers(&self, department: &str, date: NaiveDate) -> bool {
        self.includes_department(department) && self.first_day <= date && date <= self.last_day
    }

    /// Whether two scopes could touch the same persisted assignments
    pub fn overlaps(&self, other: &Scope) -> bool {
        let dates_meet = self.first_day <= other.last_day && other.first_day <= self.last_day;
        if !dates_meet {
            return false;
        }
        if self.departments.is_empty() || other.departments.is_empty() {
            return true;
        }
        self.departments.iter().any(|d| other.departments.contains(d))
    }

    pub fn key(&self) -> String {
        scope_key(
            &self.departments,
            &self.first_day.to_string(),
            &self.last_day.to_string(),
        )
    }
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(times: &[NaiveTime], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(times.iter().map(|t| t.format("%H:%M").to_string()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<NaiveTime>, D::Error> {
        let raw: Vec<String> = Vec::deserialize(deserializer)?;
        raw.iter()
            .map(|s| {
                NaiveTime::parse_from_str(s, "%H:%M")
                    .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
                    .map_err(|e| D::Error::custom(format!("invalid slot time '{}': {}", s, e)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_default_template() {
        let template = SlotTemplate::default();
        assert_eq!(template.slots_per_day(), 4);
        assert_eq!(template.start_of(0), Some(time(8, 30)));
        assert_eq!(template.start_of(4), None);
        assert!(template.validate().is_ok());
    }

    #[test]
    fn test_uniform_template() {
        let template = SlotTemplate::uniform(time(9, 0), 3, 120);
        assert_eq!(template.starts, vec![time(9, 0), time(11, 0), time(13, 0)]);
    }

    #[test]
    fn test_template_rejects_overlap() {
        let template = SlotTemplate::new(vec![time(9, 0), time(10, 0)], 90);
        assert!(matches!(template.validate(), Err(SchedError::Configuration(_))));
    }

    #[test]
    fn test_template_rejects_empty() {
        let template = SlotTemplate::new(vec![], 90);
        assert!(template.validate().is_err());
    }

    #[test]
    fn test_template_yaml_uses_hh_mm() {
        let template: SlotTemplate =
            serde_yaml::from_str("starts: [\"09:00\", \"14:00\"]\nduration_minutes: 120\n").unwrap();
        assert_eq!(template.starts, vec![time(9, 0), time(14, 0)]);
        let json = serde_json::to_value(&template).unwrap();
        assert_eq!(json["starts"][1], "14:00");
    }

    #[test]
    fn test_window_dates() {
        let window = ExamWindow::new(date(2026, 10, 19), 3);
        assert_eq!(
            window.dates(),
            vec![date(2026, 10, 19), date(2026, 10, 20), date(2026, 10, 21)]
        );
        assert_eq!(window.last_day(), date(2026, 10, 21));
    }

    #[test]
    fn test_window_skips_weekends() {
        // 2026-10-23 is a Friday
        let window = ExamWindow::new(date(2026, 10, 23), 2).skipping_weekends(true);
        assert_eq!(window.dates(), vec![date(2026, 10, 23), date(2026, 10, 26)]);
    }

    #[test]
    fn test_next_monday() {
        // Sunday -> next day
        assert_eq!(next_monday(date(2026, 10, 18)), date(2026, 10, 19));
        // Monday -> following week
        assert_eq!(next_monday(date(2026, 10, 19)), date(2026, 10, 26));
        // Wednesday
        assert_eq!(next_monday(date(2026, 10, 21)), date(2026, 10, 26));
    }

    #[test]
    fn test_scope_overlap_by_department() {
        let a = Scope::new(vec!["CS".into()], date(2026, 1, 5), date(2026, 1, 9));
        let b = Scope::new(vec!["MATH".into()], date(2026, 1, 5), date(2026, 1, 9));
        let c = Scope::new(vec!["MATH".into(), "CS".into()], date(2026, 1, 8), date(2026, 1, 12));
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(b.overlaps(&c));
    }

    #[test]
    fn test_scope_overlap_all_departments() {
        let all = Scope::new(vec![], date(2026, 1, 5), date(2026, 1, 9));
        let cs = Scope::new(vec!["CS".into()], date(2026, 1, 9), date(2026, 1, 9));
        assert!(all.overlaps(&cs));
        assert!(cs.overlaps(&all));
    }

    #[test]
    fn test_scope_disjoint_periods() {
        let a = Scope::new(vec![], date(2026, 1, 5), date(2026, 1, 9));
        let b = Scope::new(vec![], date(2026, 1, 10), date(2026, 1, 14));
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn test_scope_includes_department() {
        let all = Scope::new(vec![], date(2026, 1, 5), date(2026, 1, 9));
        let cs = Scope::new(vec!["CS".into()], date(2026, 1, 5), date(2026, 1, 9));
        assert!(all.includes_department("PHYS"));
        assert!(cs.includes_department("CS"));
        assert!(!cs.includes_department("PHYS"));
    }

    #[test]
    fn test_slots_overlapping() {
        let template = SlotTemplate::default();
        assert_eq!(template.slots_overlapping(time(8, 30), 90), vec![0]);
        // 09:45-11:45 touches the 08:30 and 11:00 slots
        assert_eq!(template.slots_overlapping(time(9, 45), 120), vec![0, 1]);
        // ends exactly when the 11:00 slot starts
        assert_eq!(template.slots_overlapping(time(9, 30), 90), vec![0]);
        assert!(template.slots_overlapping(time(18, 0), 60).is_empty());
    }

    #[test]
    fn test_scope_covers() {
        let cs = Scope::new(vec!["CS".into()], date(2026, 1, 5), date(2026, 1, 9));
        assert!(cs.covers("CS", date(2026, 1, 5)));
        assert!(cs.covers("CS", date(2026, 1, 9)));
        assert!(!cs.covers("CS", date(2026, 1, 10)));
        assert!(!cs.covers("MATH", date(2026, 1, 6)));
    }
}
