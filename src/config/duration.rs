//! Human-friendly durations in configuration and on the command line.
//!
//! Accepted forms: `250ms`, `30s`, `5m`, `1h`, compound values such as
//! `1m30s`, and bare integers (seconds).

use regex::Regex;
use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

fn component_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+)(ms|h|m|s)").expect("valid duration regex"))
}

fn full_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(?:\d+(?:ms|h|m|s))+$").expect("valid duration regex"))
}

/// Parse a duration string.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty duration".to_string());
    }

    if let Ok(secs) = input.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    if !full_pattern().is_match(input) {
        return Err(format!(
            "invalid duration '{}' (expected e.g. 500ms, 30s, 5m, 1h)",
            input
        ));
    }

    let mut total = Duration::ZERO;
    for caps in component_pattern().captures_iter(input) {
        let value: u64 = caps[1]
            .parse()
            .map_err(|_| format!("duration component too large in '{}'", input))?;
        let part = match &caps[2] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.saturating_mul(60)),
            "h" => Duration::from_secs(value.saturating_mul(3600)),
            _ => unreachable!("regex only matches known units"),
        };
        total = total.saturating_add(part);
    }
    Ok(total)
}

/// Format a duration in the same syntax [`parse_duration`] accepts.
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis == 0 {
        return "0s".to_string();
    }
    if millis % 1000 != 0 {
        return format!("{}ms", millis);
    }

    let mut secs = duration.as_secs();
    let mut out = String::new();
    for (unit, size) in [("h", 3600), ("m", 60)] {
        if secs >= size {
            out.push_str(&format!("{}{}", secs / size, unit));
            secs %= size;
        }
    }
    if secs > 0 {
        out.push_str(&format!("{}s", secs));
    }
    out
}

/// `clap` value parser for duration flags.
pub fn parse_duration_arg(input: &str) -> Result<Duration, String> {
    parse_duration(input)
}

/// Serde adapter: `#[serde(with = "crate::config::duration::serde_format")]`.
pub mod serde_format {
    use super::*;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        deserializer.deserialize_any(DurationVisitor)
    }

    struct DurationVisitor;

    impl Visitor<'_> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a duration such as 30s, 5m or a number of seconds")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Duration, E> {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Duration, E> {
            u64::try_from(v)
                .map(Duration::from_secs)
                .map_err(|_| E::custom("duration cannot be negative"))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Duration, E> {
            parse_duration(v).map_err(E::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[test]
    fn parses_single_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("5m"), Ok(Duration::from_secs(300)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    }

    #[test]
    fn parses_compound_values() {
        assert_eq!(parse_duration("1m30s"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_duration("1s500ms"), Ok(Duration::from_millis(1500)));
    }

    #[test]
    fn bare_numbers_are_seconds() {
        assert_eq!(parse_duration("45"), Ok(Duration::from_secs(45)));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("10 minutes").is_err());
        assert!(parse_duration("-5s").is_err());
    }

    #[test]
    fn formats_in_parseable_form() {
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
        assert_eq!(format_duration(Duration::from_secs(7200)), "2h");
        assert_eq!(format_duration(Duration::ZERO), "0s");
        assert_eq!(
            parse_duration(&format_duration(Duration::from_secs(3725))),
            Ok(Duration::from_secs(3725))
        );
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Holder {
        #[serde(with = "serde_format")]
        wait: Duration,
    }

    #[test]
    fn deserializes_strings_and_integers() {
        let h: Holder = serde_yaml::from_str("wait: 2m").unwrap();
        assert_eq!(h.wait, Duration::from_secs(120));

        let h: Holder = serde_yaml::from_str("wait: 15").unwrap();
        assert_eq!(h.wait, Duration::from_secs(15));
    }

    #[test]
    fn deserialize_reports_invalid_duration() {
        let err = serde_yaml::from_str::<Holder>("wait: forever").unwrap_err();
        assert!(err.to_string().contains("invalid duration"));
    }
}
