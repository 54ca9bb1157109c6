//! Daily posting slots in a named timezone or a fixed UTC offset.

use std::fmt;
use std::future::Future;

use anyhow::{bail, Context, Result};
use chrono::{
    DateTime, Days, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc,
};
use chrono_tz::Tz;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const DEFAULT_TIMES: [&str; 5] = ["09:00", "12:00", "17:00", "20:00", "23:00"];
pub const DEFAULT_TIMEZONE: &str = "Asia/Kolkata";
pub const DEFAULT_POSTS_PER_RUN: usize = 2;

/// Where the wall-clock slots are read
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Zone {
    /// IANA name such as `Asia/Kolkata`; follows daylight saving
    Named(Tz),
    Fixed(FixedOffset),
}

impl Zone {
    /// Accepts `+HH:MM` / `-HH:MM` or an IANA timezone name
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.starts_with(['+', '-']) {
            return parse_utc_offset(s).map(Zone::Fixed);
        }
        s.parse::<Tz>()
            .ok()
            .map(Zone::Named)
            .with_context(|| format!("Unknown timezone '{}', expected an IANA name or +HH:MM", s))
    }

    fn date_of(&self, now: DateTime<Utc>) -> NaiveDate {
        match self {
            Zone::Named(tz) => now.with_timezone(tz).date_naive(),
            Zone::Fixed(offset) => now.with_timezone(offset).date_naive(),
        }
    }

    /// Earliest instant showing `naive` on the wall clock; `None` inside a
    /// daylight-saving gap
    fn localize(&self, naive: &NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        match self {
            Zone::Named(tz) => tz
                .from_local_datetime(naive)
                .earliest()
                .map(|dt| dt.with_timezone(&dt.offset().fix())),
            Zone::Fixed(offset) => offset.from_local_datetime(naive).single(),
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Named(tz) => write!(f, "{}", tz.name()),
            Zone::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}

/// Sorted daily slots
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    times: Vec<NaiveTime>,
    zone: Zone,
    posts_per_run: usize,
}

impl Schedule {
    pub fn new(times: &[String], timezone: &str, posts_per_run: usize) -> Result<Self> {
        let mut parsed = times
            .iter()
            .map(|t| {
                NaiveTime::parse_from_str(t.trim(), "%H:%M")
                    .with_context(|| format!("Invalid schedule time '{}', expected HH:MM", t))
            })
            .collect::<Result<Vec<_>>>()?;
        parsed.sort();
        parsed.dedup();

        Ok(Self {
            times: parsed,
            zone: Zone::parse(timezone)?,
            posts_per_run,
        })
    }

    pub fn times(&self) -> &[NaiveTime] {
        &self.times
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    pub fn posts_per_run(&self) -> usize {
        self.posts_per_run
    }

    /// First slot strictly after `now`, or `None` for an empty schedule
    pub fn next_fire(&self, now: DateTime<Utc>) -> Option<DateTime<FixedOffset>> {
        let today = self.zone.date_of(now);

        [today, today.checked_add_days(Days::new(1))?]
            .into_iter()
            .flat_map(|day| self.times.iter().map(move |t| day.and_time(*t)))
            .filter_map(|naive| self.zone.localize(&naive))
            .find(|slot| slot.with_timezone(&Utc) > now)
    }

    /// The next `n` slots after `now`
    pub fn upcoming(&self, now: DateTime<Utc>, n: usize) -> Vec<DateTime<FixedOffset>> {
        let mut slots = Vec::with_capacity(n);
        let mut cursor = now;
        while slots.len() < n {
            let Some(next) = self.next_fire(cursor) else {
                break;
            };
            cursor = next.with_timezone(&Utc);
            slots.push(next);
        }
        slots
    }
}

/// Parse `+HH:MM` / `-HH:MM`
pub fn parse_utc_offset(s: &str) -> Result<FixedOffset> {
    let s = s.trim();
    let (sign, rest) = match s.chars().next() {
        Some('+') => (1, &s[1..]),
        Some('-') => (-1, &s[1..]),
        _ => bail!("Invalid UTC offset '{}', expected +HH:MM or -HH:MM", s),
    };
    let (hours, minutes) = rest
        .split_once(':')
        .with_context(|| format!("Invalid UTC offset '{}', expected +HH:MM or -HH:MM", s))?;
    let hours: i32 = hours
        .parse()
        .with_context(|| format!("Invalid hours in UTC offset '{}'", s))?;
    let minutes: i32 = minutes
        .parse()
        .with_context(|| format!("Invalid minutes in UTC offset '{}'", s))?;
    if !(0..60).contains(&minutes) {
        bail!("Invalid minutes in UTC offset '{}'", s);
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .with_context(|| format!("UTC offset '{}' out of range", s))
}

/// A running scheduler task. Dropping the handle stops the task at its next
/// wait; [`SchedulerHandle::shutdown`] also waits for it to end.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Spawn a task that calls `job` at every slot of `schedule`
    pub fn spawn<F, Fut>(schedule: Schedule, job: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown, mut rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let Some(next) = schedule.next_fire(now) else {
                    warn!("Schedule has no slots, scheduler idle");
                    break;
                };
                let wait = (next.with_timezone(&Utc) - now)
                    .to_std()
                    .unwrap_or_default();
                debug!(next = %next, wait_secs = wait.as_secs(), "Waiting for next slot");

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {
                        info!(slot = %next.format("%H:%M"), "Scheduled run starting");
                        job().await;
                    }
                    _ = rx.changed() => break,
                }
            }
            debug!("Scheduler stopped");
        });

        Self { shutdown, task }
    }

    /// Stop after the current job, if any, and wait for the task to end
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Scheduler task ended abnormally");
        }
    }
}
