//! Time resolution for query boundaries.
//!
//! Accepts RFC3339 timestamps or the relative forms `now` and `now-<N><unit>`
//! with unit `m`, `h`, or `d`. Relative forms resolve against the request
//! arrival instant.

use crate::error::{ActivityError, ActivityResult};
use chrono::{DateTime, Duration, Utc};

/// A time boundary, keeping the caller's original spelling so responses can
/// echo `effectiveStartTime`/`effectiveEndTime` alongside the resolved value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTime {
    pub spec: String,
    pub at: DateTime<Utc>,
}

/// Resolve one time spec. `field` names the request field for error messages.
pub fn resolve(field: &str, spec: &str, now: DateTime<Utc>) -> ActivityResult<ResolvedTime> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return Err(ActivityError::invalid(field, "time must not be empty"));
    }

    if let Some(rest) = trimmed.strip_prefix("now") {
        let at = if rest.is_empty() {
            now
        } else {
            now - parse_offset(field, rest)?
        };
        return Ok(ResolvedTime {
            spec: trimmed.to_string(),
            at,
        });
    }

    match DateTime::parse_from_rfc3339(trimmed) {
        Ok(t) => Ok(ResolvedTime {
            spec: trimmed.to_string(),
            at: t.with_timezone(&Utc),
        }),
        Err(_) => Err(ActivityError::invalid(
            field,
            format!(
                "{:?} is not an RFC3339 timestamp or a now-<N><unit> expression",
                trimmed
            ),
        )),
    }
}

fn parse_offset(field: &str, rest: &str) -> ActivityResult<Duration> {
    let body = rest.strip_prefix('-').ok_or_else(|| {
        ActivityError::invalid(field, "relative time must use the form now-<N><unit>")
    })?;
    if body.len() < 2 {
        return Err(ActivityError::invalid(
            field,
            "relative time must use the form now-<N><unit>",
        ));
    }
    let (digits, unit) = body.split_at(body.len() - 1);
    let n: i64 = digits.parse().map_err(|_| {
        ActivityError::invalid(field, format!("{:?} is not a valid duration count", digits))
    })?;
    match unit {
        "m" => Ok(Duration::minutes(n)),
        "h" => Ok(Duration::hours(n)),
        "d" => Ok(Duration::days(n)),
        other => Err(ActivityError::invalid(
            field,
            format!("unknown duration unit {:?}, expected m, h or d", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn resolves_rfc3339() {
        let r = resolve("spec.startTime", "2024-01-01T00:00:00Z", at()).unwrap();
        assert_eq!(r.at, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(r.spec, "2024-01-01T00:00:00Z");
    }

    #[test]
    fn resolves_now_and_offsets() {
        assert_eq!(resolve("f", "now", at()).unwrap().at, at());
        assert_eq!(
            resolve("f", "now-15m", at()).unwrap().at,
            at() - Duration::minutes(15)
        );
        assert_eq!(
            resolve("f", "now-6h", at()).unwrap().at,
            at() - Duration::hours(6)
        );
        assert_eq!(
            resolve("f", "now-7d", at()).unwrap().at,
            at() - Duration::days(7)
        );
    }

    #[test]
    fn format_round_trips() {
        let t = at();
        let r = resolve("f", &t.to_rfc3339(), at()).unwrap();
        assert_eq!(r.at, t);
    }

    #[test]
    fn rejects_bad_syntax() {
        for bad in ["", "yesterday", "now+1h", "now-", "now-h", "now-12w", "now-x1m"] {
            let err = resolve("spec.endTime", bad, at()).unwrap_err();
            assert_eq!(err.status_code(), 422, "expected 422 for {:?}", bad);
        }
    }
}
