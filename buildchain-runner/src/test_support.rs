//! Scripted in-memory CI server for runner tests

use async_trait::async_trait;
use buildchain_client::{CiClient, ClientError, Result, StatusProbe};
use buildchain_core::config::{Configuration, Credential};
use buildchain_core::domain::build::{
    BuildSnapshot, BuildStatus, Crumb, QueueItem, QueueRef, TriggerResult,
};
use buildchain_core::domain::job::JobSpec;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// Failure a scripted call answers with
#[derive(Debug, Clone, Copy)]
pub enum Fail {
    /// 503, transient
    Unavailable,
    /// 401
    Unauthorized,
    /// 403 on trigger
    Forbidden,
    /// 404
    NotFound,
}

impl Fail {
    pub fn error(self) -> ClientError {
        match self {
            Fail::Unavailable => ClientError::api_error(503, "Service Unavailable"),
            Fail::Unauthorized => ClientError::Auth {
                status: 401,
                message: "Invalid password/token for user".to_string(),
            },
            Fail::Forbidden => ClientError::Trigger {
                status: 403,
                body: "deployer is missing the Job/Build permission".to_string(),
            },
            Fail::NotFound => ClientError::api_error(404, "Not Found"),
        }
    }
}

pub type Reply<T> = std::result::Result<T, Fail>;

/// Sequence of replies; the last one repeats forever
#[derive(Debug, Clone)]
struct Replies<T: Clone>(VecDeque<T>);

impl<T: Clone> Replies<T> {
    fn new(values: impl IntoIterator<Item = T>) -> Self {
        Self(values.into_iter().collect())
    }

    fn next(&mut self) -> Option<T> {
        if self.0.len() > 1 {
            self.0.pop_front()
        } else {
            self.0.front().cloned()
        }
    }
}

/// Server-side behavior of one job
#[derive(Debug, Clone)]
pub struct JobScript {
    latest: Replies<Reply<Option<u64>>>,
    triggers: Replies<Reply<TriggerResult>>,
    queue: Replies<Reply<QueueItem>>,
    statuses: Replies<Reply<BuildStatus>>,
    stop: Reply<()>,
}

impl JobScript {
    pub fn new() -> Self {
        Self {
            latest: Replies::new([Ok(None)]),
            triggers: Replies::new([Ok(TriggerResult::Accepted)]),
            queue: Replies::new([Ok(QueueItem::default())]),
            statuses: Replies::new([Ok(BuildStatus::Success)]),
            stop: Ok(()),
        }
    }

    /// Job whose trigger synchronously starts `number` after baseline `number - 1`
    pub fn succeeding(number: u64) -> Self {
        Self::new()
            .latest([Some(number - 1)])
            .trigger(Ok(TriggerResult::Started(number)))
    }

    pub fn latest(mut self, values: impl IntoIterator<Item = Option<u64>>) -> Self {
        self.latest = Replies::new(values.into_iter().map(Ok));
        self
    }

    pub fn latest_replies(mut self, replies: impl IntoIterator<Item = Reply<Option<u64>>>) -> Self {
        self.latest = Replies::new(replies);
        self
    }

    pub fn trigger(self, reply: Reply<TriggerResult>) -> Self {
        self.triggers_replies([reply])
    }

    pub fn triggers_replies(mut self, replies: impl IntoIterator<Item = Reply<TriggerResult>>) -> Self {
        self.triggers = Replies::new(replies);
        self
    }

    pub fn queue(mut self, items: impl IntoIterator<Item = QueueItem>) -> Self {
        self.queue = Replies::new(items.into_iter().map(Ok));
        self
    }

    pub fn queue_replies(mut self, replies: impl IntoIterator<Item = Reply<QueueItem>>) -> Self {
        self.queue = Replies::new(replies);
        self
    }

    pub fn statuses(mut self, statuses: impl IntoIterator<Item = BuildStatus>) -> Self {
        self.statuses = Replies::new(statuses.into_iter().map(Ok));
        self
    }

    pub fn status_replies(mut self, replies: impl IntoIterator<Item = Reply<BuildStatus>>) -> Self {
        self.statuses = Replies::new(replies);
        self
    }

    pub fn stop(mut self, reply: Reply<()>) -> Self {
        self.stop = reply;
        self
    }
}

#[derive(Debug, Default)]
struct Calls {
    triggers: Vec<String>,
    stops: Vec<(String, u64)>,
    status_queries: usize,
}

/// [`CiClient`] answering from per-job scripts and recording every call
#[derive(Debug, Default)]
pub struct ScriptedClient {
    jobs: Mutex<HashMap<String, JobScript>>,
    calls: Mutex<Calls>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job(self, name: &str, script: JobScript) -> Self {
        self.jobs.lock().unwrap().insert(name.to_string(), script);
        self
    }

    pub fn triggered(&self) -> Vec<String> {
        self.calls.lock().unwrap().triggers.clone()
    }

    pub fn stopped(&self) -> Vec<(String, u64)> {
        self.calls.lock().unwrap().stops.clone()
    }

    pub fn status_queries(&self) -> usize {
        self.calls.lock().unwrap().status_queries
    }

    fn with_job<T>(&self, name: &str, f: impl FnOnce(&mut JobScript) -> Result<T>) -> Result<T> {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.get_mut(name) {
            Some(script) => f(script),
            None => Err(Fail::NotFound.error()),
        }
    }
}

fn answer<T>(reply: Option<Reply<T>>) -> Result<T> {
    match reply {
        Some(Ok(value)) => Ok(value),
        Some(Err(fail)) => Err(fail.error()),
        None => Err(Fail::NotFound.error()),
    }
}

#[async_trait]
impl CiClient for ScriptedClient {
    async fn fetch_crumb(&self) -> Result<Option<Crumb>> {
        Ok(Some(Crumb {
            field: "Jenkins-Crumb".to_string(),
            value: "test-crumb".to_string(),
        }))
    }

    async fn trigger_job(&self, job: &JobSpec, _branch: &str) -> Result<TriggerResult> {
        self.calls.lock().unwrap().triggers.push(job.name.clone());
        self.with_job(&job.name, |script| answer(script.triggers.next()))
    }

    async fn latest_build_number(&self, job_name: &str) -> Result<Option<u64>> {
        self.with_job(job_name, |script| answer(script.latest.next()))
    }

    async fn build_status(&self, job_name: &str, number: u64) -> Result<BuildSnapshot> {
        self.calls.lock().unwrap().status_queries += 1;
        self.with_job(job_name, |script| {
            let status = answer(script.statuses.next())?;
            Ok(BuildSnapshot {
                number,
                status,
                duration: Duration::from_secs(1),
                url: Some(format!("http://ci/job/{}/{}/", job_name, number)),
            })
        })
    }

    async fn queue_item(&self, queue: &QueueRef) -> Result<QueueItem> {
        // Queue URLs are scripted as "http://ci/queue/<job>/"
        let job_name = queue
            .url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        self.with_job(&job_name, |script| answer(script.queue.next()))
    }

    async fn stop_build(&self, job_name: &str, number: u64) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .stops
            .push((job_name.to_string(), number));
        self.with_job(job_name, |script| match script.stop {
            Ok(()) => Ok(()),
            Err(_) => Err(ClientError::Stop {
                status: 500,
                body: "stop failed".to_string(),
            }),
        })
    }
}

/// Queue handle the scripted client maps back to `job_name`
pub fn queued(job_name: &str) -> TriggerResult {
    TriggerResult::Queued(QueueRef {
        url: format!("http://ci/queue/{}/", job_name),
    })
}

/// [`StatusProbe`] answering from a fixed sequence of status codes
#[derive(Debug)]
pub struct ScriptedProbe {
    statuses: Mutex<Replies<u16>>,
    calls: Mutex<usize>,
}

impl ScriptedProbe {
    pub fn new(statuses: impl IntoIterator<Item = u16>) -> Self {
        Self {
            statuses: Mutex::new(Replies::new(statuses)),
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl StatusProbe for ScriptedProbe {
    async fn probe(&self, _url: &str) -> Result<u16> {
        *self.calls.lock().unwrap() += 1;
        self.statuses
            .lock()
            .unwrap()
            .next()
            .ok_or_else(|| ClientError::api_error(503, "no scripted status"))
    }
}

/// Configuration with short, test-friendly intervals
pub fn test_config(jobs: &[&str]) -> Configuration {
    let mut config = Configuration::new(
        "http://ci",
        Credential {
            username: "deployer".to_string(),
            secret: "token".to_string(),
        },
        jobs.iter().map(|name| JobSpec::new(*name)).collect(),
    );
    config.wait_between_builds = Duration::from_secs(30);
    config.build.check_interval = Duration::from_secs(30);
    config.build.timeout = Duration::from_secs(300);
    config.identity.poll_interval = Duration::from_secs(2);
    config.identity.timeout = Duration::from_secs(20);
    config
}
