//! Time sources for the engine.
//!
//! Every temporal decision (expiry, grace windows, streak day math) threads an
//! explicit instant and timezone through pure functions; nothing in the engine
//! reads an ambient clock. Production code hands the engine a [`SystemClock`],
//! tests a [`FixedClock`].

use chrono::{DateTime, FixedOffset, Utc};

/// Supplies the current instant and a per-user timezone.
///
/// User timezones are fixed UTC offsets supplied by the host application
/// (which knows its users); the engine never consults a tz database.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Timezone for a user's local-midnight calculations.
    fn timezone_of(&self, user_id: &str) -> FixedOffset;
}

/// Wall-clock time with a single configured offset for all users.
#[derive(Debug, Clone)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Parse an offset like `"+09:00"` or `"-05:30"`.
    pub fn with_offset_str(offset: &str) -> Option<Self> {
        parse_offset(offset).map(Self::new)
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            offset: FixedOffset::east_opt(0).unwrap(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn timezone_of(&self, _user_id: &str) -> FixedOffset {
        self.offset
    }
}

/// Deterministic clock for tests: a pinned instant and offset.
#[derive(Debug, Clone)]
pub struct FixedClock {
    pub instant: DateTime<Utc>,
    pub offset: FixedOffset,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self { instant, offset }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.instant
    }

    fn timezone_of(&self, _user_id: &str) -> FixedOffset {
        self.offset
    }
}

/// Parse `"+HH:MM"` / `"-HH:MM"` into a fixed offset.
pub fn parse_offset(value: &str) -> Option<FixedOffset> {
    let value = value.trim();
    let (sign, rest) = match value.strip_prefix('+') {
        Some(rest) => (1i32, rest),
        None => match value.strip_prefix('-') {
            Some(rest) => (-1i32, rest),
            None => (1i32, value),
        },
    };
    let (hours, minutes) = rest.split_once(':')?;
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if !(0..=14).contains(&hours) || !(0..=59).contains(&minutes) {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
