use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::job::JobRecord;

/// Coverage percentage with two fixed decimal places.
///
/// Stored as hundredths so equality and display are exact; serialized as a
/// decimal string such as `"35.00"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Coverage(i64);

impl Coverage {
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_percent(value: f64) -> Self {
        Self((value * 100.0).round() as i64)
    }

    pub fn hundredths(self) -> i64 {
        self.0
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for Coverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Serialize for Coverage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Coverage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.trim()
            .parse::<f64>()
            .map(Coverage::from_percent)
            .map_err(serde::de::Error::custom)
    }
}

/// Unweighted mean of the coverage reported by current jobs.
///
/// Jobs without coverage are ignored; `None` when no job reports any.
pub fn aggregate_coverage(current: &[&JobRecord]) -> Option<Coverage> {
    let values: Vec<f64> = current.iter().filter_map(|j| j.coverage).collect();
    if values.is_empty() {
        return None;
    }

    #[allow(clippy::cast_precision_loss)]
    let average = values.iter().sum::<f64>() / values.len() as f64;
    Some(Coverage::from_percent(average))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::retry::current_jobs;

    fn create_job(id: u64, name: &str, coverage: Option<f64>) -> JobRecord {
        JobRecord {
            coverage,
            ..JobRecord::new(id, 1, name, "test", 1)
        }
    }

    fn coverage_of(jobs: &[JobRecord]) -> Option<Coverage> {
        aggregate_coverage(&current_jobs(jobs))
    }

    #[test]
    fn averages_two_jobs() {
        let jobs = vec![
            create_job(1, "rspec", Some(30.0)),
            create_job(2, "rubocop", Some(40.0)),
        ];
        assert_eq!(coverage_of(&jobs).map(|c| c.to_string()), Some("35.00".into()));
    }

    #[test]
    fn ignores_jobs_without_coverage() {
        let jobs = vec![
            create_job(1, "rspec", Some(30.0)),
            create_job(2, "rubocop", Some(40.0)),
            create_job(3, "build", None),
        ];
        assert_eq!(coverage_of(&jobs).map(|c| c.to_string()), Some("35.00".into()));
    }

    #[test]
    fn ignores_retried_jobs() {
        let jobs = vec![
            create_job(1, "rspec", Some(30.0)),
            create_job(2, "rubocop", Some(30.0)),
            create_job(3, "rubocop", Some(40.0)),
        ];
        assert_eq!(coverage_of(&jobs).map(|c| c.to_string()), Some("35.00".into()));
    }

    #[test]
    fn none_when_nothing_reports_coverage() {
        let jobs = vec![create_job(1, "build", None)];
        assert!(coverage_of(&jobs).is_none());
        assert!(aggregate_coverage(&[]).is_none());
    }

    #[test]
    fn rounds_to_two_decimals() {
        let jobs = vec![
            create_job(1, "a", Some(10.0)),
            create_job(2, "b", Some(20.0)),
            create_job(3, "c", Some(20.0)),
        ];
        let coverage = coverage_of(&jobs).unwrap();
        assert_eq!(coverage.hundredths(), 1667);
        assert_eq!(coverage.to_string(), "16.67");
    }

    #[test]
    fn serializes_as_decimal_string() {
        let coverage = Coverage::from_percent(35.0);
        assert_eq!(serde_json::to_string(&coverage).unwrap(), "\"35.00\"");
        let parsed: Coverage = serde_json::from_str("\"72.5\"").unwrap();
        assert_eq!(parsed.to_string(), "72.50");
    }
}
