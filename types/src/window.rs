use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Upbit trading days roll over at midnight KST.
const EXCHANGE_UTC_OFFSET_SECS: i32 = 9 * 3600;

#[derive(Debug, Clone, Copy)]
enum Bound {
    Start,
    End,
}

/// Historical range to backfill. `end` is the newest instant wanted, `start` the
/// boundary at which the backfill is considered complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Result<Self, Error> {
        if let Some(end) = end {
            if end <= start {
                return Err(Error::WindowError(format!(
                    "start={start} must be before end={end}"
                )));
            }
        }
        return Ok(Self { start, end });
    }

    /// Accepts RFC 3339 instants, naive `YYYY-MM-DDTHH:MM:SS` instants (UTC) or
    /// plain `YYYY-MM-DD` dates. A start date covers the exchange day from
    /// 00:00:00 KST, an end date up to 23:59:59 KST.
    pub fn parse(start: &str, end: Option<&str>) -> Result<Self, Error> {
        let start = parse_bound(start, Bound::Start)?;
        let end = match end.map(str::trim).filter(|x| !x.is_empty()) {
            Some(x) => Some(parse_bound(x, Bound::End)?),
            None => None,
        };
        return Self::new(start, end);
    }

    pub fn start(&self) -> DateTime<Utc> {
        return self.start;
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        return self.end;
    }

    pub fn end_or(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        return self.end.unwrap_or(now);
    }
}

fn exchange_offset() -> Result<FixedOffset, Error> {
    return FixedOffset::east_opt(EXCHANGE_UTC_OFFSET_SECS)
        .ok_or_else(|| Error::WindowError("invalid exchange offset".to_owned()));
}

fn parse_bound(value: &str, bound: Bound) -> Result<DateTime<Utc>, Error> {
    let value = value.trim();

    if let Ok(x) = DateTime::parse_from_rfc3339(value) {
        return Ok(x.with_timezone(&Utc));
    }
    if let Ok(x) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Ok(x.and_utc());
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|err| {
        Error::WindowError(format!(
            "{value}: expected YYYY-MM-DD, YYYY-MM-DDTHH:MM:SS or RFC 3339 ({err})"
        ))
    })?;
    let time = match bound {
        Bound::Start => NaiveTime::MIN,
        Bound::End => NaiveTime::from_hms_opt(23, 59, 59)
            .ok_or_else(|| Error::WindowError("invalid end of day".to_owned()))?,
    };
    let local = exchange_offset()?
        .from_local_datetime(&date.and_time(time))
        .single()
        .ok_or_else(|| Error::WindowError(format!("{value}: ambiguous local time")))?;
    return Ok(local.with_timezone(&Utc));
}
