//! Serde helpers for durations.
//!
//! Durations are read either as integer nanoseconds (the wire form used by
//! stored check results) or as a string with a unit suffix such as `"500ms"`,
//! `"5s"` or `"2m"`. They are always written as integer nanoseconds.

use std::{fmt, time::Duration};

use serde::{Deserializer, Serializer, de};

/// Parse a duration string like "250ns", "10us", "500ms", "5s", "2m", "1h".
/// A bare number is taken as nanoseconds. Values too large to represent
/// yield `None`.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let units: [(&str, fn(u64) -> Option<Duration>); 6] = [
        ("ns", |v| Some(Duration::from_nanos(v))),
        ("us", |v| Some(Duration::from_micros(v))),
        ("ms", |v| Some(Duration::from_millis(v))),
        ("s", |v| Some(Duration::from_secs(v))),
        ("m", |m| m.checked_mul(60).map(Duration::from_secs)),
        ("h", |h| h.checked_mul(3600).map(Duration::from_secs)),
    ];

    for (suffix, make) in units {
        if let Some(value) = s.strip_suffix(suffix) {
            return value.trim().parse::<u64>().ok().and_then(make);
        }
    }
    s.parse::<u64>().ok().map(Duration::from_nanos)
}

fn nanos(duration: &Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

struct DurationVisitor;

impl de::Visitor<'_> for DurationVisitor {
    type Value = Duration;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("integer nanoseconds or a duration string such as \"500ms\"")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Duration, E> {
        Ok(Duration::from_nanos(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Duration, E> {
        u64::try_from(v)
            .map(Duration::from_nanos)
            .map_err(|_| E::custom("duration must not be negative"))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Duration, E> {
        parse_duration(v).ok_or_else(|| E::custom(format!("invalid duration '{v}'")))
    }
}

pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(nanos(duration))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    deserializer.deserialize_any(DurationVisitor)
}

/// Same as the parent module, for `Option<Duration>` fields.
pub mod option {
    use std::{fmt, time::Duration};

    use serde::{Deserializer, Serializer, de};

    use super::DurationVisitor;

    pub fn serialize<S: Serializer>(
        duration: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match duration {
            Some(d) => serializer.serialize_some(&super::nanos(d)),
            None => serializer.serialize_none(),
        }
    }

    struct OptionVisitor;

    impl<'de> de::Visitor<'de> for OptionVisitor {
        type Value = Option<Duration>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an optional duration")
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
            d.deserialize_any(DurationVisitor).map(Some)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        deserializer.deserialize_option(OptionVisitor)
    }
}
