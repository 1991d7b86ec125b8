//! JSON shapes of the Jenkins remote-access API
//!
//! Only the fields the runner needs are modelled; everything else in the
//! responses is ignored.

use buildchain_core::domain::build::{
    BuildSnapshot, BuildStatus, Crumb, QueueItem, QueueRef, TriggerResult,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CrumbResponse {
    pub crumb_request_field: String,
    pub crumb: String,
}

impl From<CrumbResponse> for Crumb {
    fn from(response: CrumbResponse) -> Self {
        Self {
            field: response.crumb_request_field,
            value: response.crumb,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct BuildRef {
    pub number: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobResponse {
    #[serde(default)]
    pub last_build: Option<BuildRef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QueueItemResponse {
    #[serde(default)]
    pub executable: Option<BuildRef>,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub why: Option<String>,
}

impl From<QueueItemResponse> for QueueItem {
    fn from(response: QueueItemResponse) -> Self {
        Self {
            executable: response.executable.map(|build| build.number),
            cancelled: response.cancelled,
            why: response.why,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct BuildResponse {
    pub number: u64,
    #[serde(default)]
    pub building: bool,
    #[serde(default)]
    pub result: Option<String>,
    /// Total duration in milliseconds, 0 while building
    #[serde(default)]
    pub duration: u64,
    /// Start time in milliseconds since the epoch
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub url: Option<String>,
}

impl BuildResponse {
    pub fn status(&self) -> BuildStatus {
        if self.building {
            return BuildStatus::Running;
        }
        match self.result.as_deref() {
            None => BuildStatus::Running,
            Some("SUCCESS") => BuildStatus::Success,
            Some("ABORTED") => BuildStatus::Aborted,
            Some(_) => BuildStatus::Failure,
        }
    }

    /// Converts to a snapshot, deriving elapsed time from the start timestamp while running
    pub fn into_snapshot(self, now: DateTime<Utc>) -> BuildSnapshot {
        let status = self.status();
        let duration = if status == BuildStatus::Running {
            DateTime::<Utc>::from_timestamp_millis(self.timestamp)
                .and_then(|started| (now - started).to_std().ok())
                .unwrap_or(Duration::ZERO)
        } else {
            Duration::from_millis(self.duration)
        };

        BuildSnapshot {
            number: self.number,
            status,
            duration,
            url: self.url,
        }
    }
}

/// Interprets the `Location` header of an accepted trigger request
///
/// Queue item URLs become [`TriggerResult::Queued`]; URLs ending in a build
/// number become [`TriggerResult::Started`].
pub(crate) fn parse_trigger_location(
    location: Option<&str>,
    absolute: impl Fn(&str) -> String,
) -> TriggerResult {
    let Some(location) = location.filter(|l| !l.trim().is_empty()) else {
        return TriggerResult::Accepted;
    };

    if location.contains("/queue/item/") {
        let mut url = absolute(location);
        if !url.ends_with('/') {
            url.push('/');
        }
        return TriggerResult::Queued(QueueRef { url });
    }

    let last_segment = location
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();

    match last_segment.parse::<u64>() {
        Ok(number) => TriggerResult::Started(number),
        Err(_) => TriggerResult::Accepted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(location: &str) -> String {
        format!("http://ci{}", location)
    }

    #[test]
    fn test_parse_queue_location() {
        let result = parse_trigger_location(Some("http://ci/queue/item/17"), |l| l.to_string());
        assert_eq!(
            result,
            TriggerResult::Queued(QueueRef {
                url: "http://ci/queue/item/17/".to_string()
            })
        );

        let result = parse_trigger_location(Some("/queue/item/17/"), identity);
        assert_eq!(result.queue_ref().unwrap().url, "http://ci/queue/item/17/");
    }

    #[test]
    fn test_parse_build_location() {
        let result = parse_trigger_location(Some("http://ci/job/build-app/123/"), |l| l.to_string());
        assert_eq!(result, TriggerResult::Started(123));
    }

    #[test]
    fn test_parse_missing_or_unknown_location() {
        assert_eq!(parse_trigger_location(None, identity), TriggerResult::Accepted);
        assert_eq!(parse_trigger_location(Some(""), identity), TriggerResult::Accepted);
        assert_eq!(
            parse_trigger_location(Some("http://ci/job/build-app/"), identity),
            TriggerResult::Accepted
        );
    }

    #[test]
    fn test_build_status_classification() {
        let build = |building: bool, result: Option<&str>| BuildResponse {
            number: 5,
            building,
            result: result.map(str::to_string),
            duration: 0,
            timestamp: 0,
            url: None,
        };

        assert_eq!(build(true, None).status(), BuildStatus::Running);
        assert_eq!(build(false, None).status(), BuildStatus::Running);
        assert_eq!(build(false, Some("SUCCESS")).status(), BuildStatus::Success);
        assert_eq!(build(false, Some("ABORTED")).status(), BuildStatus::Aborted);
        assert_eq!(build(false, Some("FAILURE")).status(), BuildStatus::Failure);
        assert_eq!(build(false, Some("UNSTABLE")).status(), BuildStatus::Failure);
        assert_eq!(build(false, Some("NOT_BUILT")).status(), BuildStatus::Failure);
    }

    #[test]
    fn test_snapshot_duration() {
        let now = DateTime::<Utc>::from_timestamp_millis(100_000).unwrap();

        let running: BuildResponse = serde_json::from_str(
            r#"{"number": 9, "building": true, "result": null, "duration": 0, "timestamp": 40000}"#,
        )
        .unwrap();
        let snapshot = running.into_snapshot(now);
        assert_eq!(snapshot.status, BuildStatus::Running);
        assert_eq!(snapshot.duration, Duration::from_secs(60));

        let finished: BuildResponse = serde_json::from_str(
            r#"{"number": 9, "building": false, "result": "SUCCESS", "duration": 1500,
                "timestamp": 40000, "url": "http://ci/job/a/9/"}"#,
        )
        .unwrap();
        let snapshot = finished.into_snapshot(now);
        assert_eq!(snapshot.duration, Duration::from_millis(1500));
        assert_eq!(snapshot.url.as_deref(), Some("http://ci/job/a/9/"));
    }

    #[test]
    fn test_queue_item_response() {
        let pending: QueueItemResponse =
            serde_json::from_str(r#"{"why": "Waiting for next available executor"}"#).unwrap();
        let item = QueueItem::from(pending);
        assert_eq!(item.executable, None);
        assert!(!item.cancelled);

        let started: QueueItemResponse =
            serde_json::from_str(r#"{"executable": {"number": 123, "url": "x"}}"#).unwrap();
        assert_eq!(QueueItem::from(started).executable, Some(123));
    }

    #[test]
    fn test_job_response_without_builds() {
        let job: JobResponse = serde_json::from_str(r#"{"lastBuild": null}"#).unwrap();
        assert!(job.last_build.is_none());
    }
}
