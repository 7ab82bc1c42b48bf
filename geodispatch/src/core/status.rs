//! Job type, schedule type and satellite enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of geospatial work a job definition performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Fetch raw imagery or derived data for an area.
    FetchData,
    /// Evaluate alert rules against fresh data.
    AlertEval,
    /// Compute vegetation or other metrics.
    MetricCalc,
    /// Detect anomalies against thresholds.
    AnomalyDetection,
    /// Compare imagery across a date range.
    ChangeAnalysis,
    /// Continuous data-quality monitoring.
    Monitoring,
    /// A job type this build does not recognise.
    #[serde(other)]
    Unknown,
}

impl JobType {
    /// Returns the wire name of the job type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FetchData => "fetch_data",
            Self::AlertEval => "alert_eval",
            Self::MetricCalc => "metric_calc",
            Self::AnomalyDetection => "anomaly_detection",
            Self::ChangeAnalysis => "change_analysis",
            Self::Monitoring => "monitoring",
            Self::Unknown => "unknown",
        }
    }

    /// Parses a wire name, mapping anything unrecognised to `Unknown`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "fetch_data" => Self::FetchData,
            "alert_eval" => Self::AlertEval,
            "metric_calc" => Self::MetricCalc,
            "anomaly_detection" => Self::AnomalyDetection,
            "change_analysis" => Self::ChangeAnalysis,
            "monitoring" => Self::Monitoring,
            _ => Self::Unknown,
        }
    }

    /// Payload fields required in addition to `coordinates` and `satellite_type`.
    #[must_use]
    pub const fn extra_required_fields(self) -> &'static [&'static str] {
        match self {
            Self::AnomalyDetection => &["metrics", "threshold_config"],
            Self::ChangeAnalysis => &["date_range", "analysis_type"],
            Self::Monitoring => &["validation_rules"],
            _ => &[],
        }
    }

    /// Whether jobs of this type call out to the imagery service.
    #[must_use]
    pub const fn needs_imagery_service(self) -> bool {
        matches!(self, Self::AnomalyDetection | Self::ChangeAnalysis)
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a job definition is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    /// Driven by a cron expression.
    Cron,
    /// Runs every N days.
    Interval,
    /// Runs when a domain event fires.
    #[default]
    EventTriggered,
    /// A schedule type this build does not recognise.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ScheduleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cron => write!(f, "cron"),
            Self::Interval => write!(f, "interval"),
            Self::EventTriggered => write!(f, "event_triggered"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Imagery sources a job may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SatelliteType {
    /// ESA Sentinel-2.
    #[serde(rename = "Sentinel-2")]
    Sentinel2,
    /// USGS Landsat-8.
    #[serde(rename = "Landsat-8")]
    Landsat8,
    /// NASA MODIS.
    #[serde(rename = "MODIS")]
    Modis,
}

impl SatelliteType {
    /// All supported satellites.
    pub const ALL: [Self; 3] = [Self::Sentinel2, Self::Landsat8, Self::Modis];

    /// Parses the payload tag; only the exact allow-listed spellings match.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|sat| sat.as_str() == s)
    }

    /// Returns the payload tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sentinel2 => "Sentinel-2",
            Self::Landsat8 => "Landsat-8",
            Self::Modis => "MODIS",
        }
    }

    /// Processing-time multiplier relative to Sentinel-2.
    #[must_use]
    pub const fn duration_multiplier(self) -> f64 {
        match self {
            Self::Sentinel2 => 1.0,
            Self::Landsat8 => 1.2,
            Self::Modis => 0.8,
        }
    }
}

impl fmt::Display for SatelliteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_type_parse_round_trip() {
        for ty in [
            JobType::FetchData,
            JobType::AlertEval,
            JobType::MetricCalc,
            JobType::AnomalyDetection,
            JobType::ChangeAnalysis,
            JobType::Monitoring,
        ] {
            assert_eq!(JobType::parse(ty.as_str()), ty);
        }
        assert_eq!(JobType::parse("weather_sync"), JobType::Unknown);
    }

    #[test]
    fn test_job_type_deserialize_unknown() {
        let ty: JobType = serde_json::from_str("\"soil_moisture\"").unwrap();
        assert_eq!(ty, JobType::Unknown);
    }

    #[test]
    fn test_extra_required_fields() {
        assert_eq!(
            JobType::AnomalyDetection.extra_required_fields(),
            &["metrics", "threshold_config"]
        );
        assert!(JobType::FetchData.extra_required_fields().is_empty());
    }

    #[test]
    fn test_satellite_parse_is_exact() {
        assert_eq!(SatelliteType::parse("Landsat-8"), Some(SatelliteType::Landsat8));
        assert_eq!(SatelliteType::parse("landsat-8"), None);
        assert_eq!(SatelliteType::parse("Sentinel-1"), None);
    }

    #[test]
    fn test_schedule_type_serde() {
        let s: ScheduleType = serde_json::from_str("\"event_triggered\"").unwrap();
        assert_eq!(s, ScheduleType::EventTriggered);
        assert_eq!(ScheduleType::Cron.to_string(), "cron");
    }
}
