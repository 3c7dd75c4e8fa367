pub mod settings;

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use settings::{
    ai_configured, read_settings, settings_path, ReferenceOrder, Settings, TemplateVariant,
    UsageCommitPolicy,
};

/// Header value the browser client sends when it has no user id yet.
pub const UNSET_IDENTITY: &str = "undefined";

// --- Types ---

/// Opaque caller token taken from the identity header. Issued upstream; only
/// checked here for presence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerIdentity(String);

impl CallerIdentity {
    /// Returns `None` for an absent, blank or placeholder identity.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        let raw = raw?;
        if raw.trim().is_empty() || raw == UNSET_IDENTITY {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One consumed generation. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub caller: CallerIdentity,
    pub occurred_at: DateTime<Utc>,
}

/// A row of grounding data (typically a video title) owned by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceRecord {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl ReferenceRecord {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            label: None,
        }
    }
}

// --- Quota window ---

/// Time zone whose calendar day bounds the quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ReferenceZone {
    /// The server's local zone.
    #[default]
    Local,
    Utc,
    Fixed(FixedOffset),
}

impl std::str::FromStr for ReferenceZone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "local" => return Ok(Self::Local),
            "utc" | "z" => return Ok(Self::Utc),
            _ => {}
        }
        parse_offset(s)
            .map(Self::Fixed)
            .ok_or_else(|| format!("invalid time zone '{s}' (expected local, utc or +HH:MM)"))
    }
}

impl TryFrom<String> for ReferenceZone {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ReferenceZone> for String {
    fn from(zone: ReferenceZone) -> Self {
        match zone {
            ReferenceZone::Local => "local".to_string(),
            ReferenceZone::Utc => "utc".to_string(),
            ReferenceZone::Fixed(offset) => offset.to_string(),
        }
    }
}

fn parse_offset(s: &str) -> Option<FixedOffset> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 => (rest.get(..2)?, rest.get(2..)?),
        None => (rest, "0"),
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Half-open interval `[start of today, now)` over which usage is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl QuotaWindow {
    pub fn current(zone: ReferenceZone, now: DateTime<Utc>) -> Self {
        let start = match zone {
            ReferenceZone::Local => start_of_day(&Local, now),
            ReferenceZone::Utc => start_of_day(&Utc, now),
            ReferenceZone::Fixed(offset) => start_of_day(&offset, now),
        };
        Self { start, end: now }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

fn start_of_day<Tz: TimeZone>(tz: &Tz, now: DateTime<Utc>) -> DateTime<Utc> {
    let Some(midnight) = now.with_timezone(tz).date_naive().and_hms_opt(0, 0, 0) else {
        return now;
    };
    first_valid_instant(tz, midnight).unwrap_or(now)
}

/// Midnight can fall inside a DST gap; take the earliest instant of the day
/// that actually exists.
fn first_valid_instant<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    (0..=2)
        .filter_map(|h| {
            tz.from_local_datetime(&(naive + chrono::Duration::hours(h)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
        .next()
}
