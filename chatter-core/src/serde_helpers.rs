//! Serde helpers for the cache's JSON encodings.

/// `createdAt` as an ISO-8601 string with millisecond precision.
///
/// Deserialization also accepts epoch milliseconds, either as a number or
/// as a numeric string, so snapshots written by earlier clients still load.
pub mod created_at {
    use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(CreatedAtVisitor)
    }

    struct CreatedAtVisitor;

    fn from_millis<E: de::Error>(millis: i64) -> Result<DateTime<Utc>, E> {
        Utc.timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| E::custom(format!("timestamp out of range: {}", millis)))
    }

    impl<'de> Visitor<'de> for CreatedAtVisitor {
        type Value = DateTime<Utc>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("an ISO-8601 timestamp or epoch milliseconds")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if let Ok(millis) = v.parse::<i64>() {
                return from_millis(millis);
            }
            DateTime::parse_from_rfc3339(v)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| E::custom(format!("invalid timestamp {:?}: {}", v, e)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            from_millis(v)
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            let millis = i64::try_from(v).map_err(|_| E::custom("timestamp out of range"))?;
            from_millis(millis)
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if !v.is_finite() || v < i64::MIN as f64 || v >= i64::MAX as f64 {
                return Err(E::custom("timestamp out of range"));
            }
            from_millis(v as i64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    #[derive(serde::Serialize, serde::Deserialize, Debug, PartialEq)]
    struct Stamped {
        #[serde(with = "created_at")]
        at: DateTime<Utc>,
    }

    fn expected() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_123).unwrap()
    }

    #[test]
    fn serializes_iso8601_with_millis() {
        let json = serde_json::to_string(&Stamped { at: expected() }).unwrap();
        assert_eq!(json, r#"{"at":"2023-11-14T22:13:20.123Z"}"#);
    }

    #[test]
    fn accepts_epoch_millis_number() {
        let v: Stamped = serde_json::from_str(r#"{"at":1700000000123}"#).unwrap();
        assert_eq!(v.at, expected());
    }

    #[test]
    fn rejects_non_finite_and_huge_floats() {
        use serde::de::value::{Error, F64Deserializer};
        use serde::de::IntoDeserializer;

        for v in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, 1e300] {
            let deserializer: F64Deserializer<Error> = v.into_deserializer();
            let result = created_at::deserialize(deserializer);
            assert!(result.is_err(), "{v} should be rejected");
        }

        let v: Stamped = serde_json::from_str(r#"{"at":1700000000123.0}"#).unwrap();
        assert_eq!(v.at, expected());
    }

    #[test]
    fn accepts_epoch_millis_string() {
        let v: Stamped = serde_json::from_str(r#"{"at":"1700000000123"}"#).unwrap();
        assert_eq!(v.at, expected());
    }

    #[test]
    fn accepts_offset_timestamps() {
        let v: Stamped = serde_json::from_str(r#"{"at":"2023-11-15T00:13:20.123+02:00"}"#).unwrap();
        assert_eq!(v.at, expected());
    }

    #[test]
    fn rejects_garbage() {
        assert!(serde_json::from_str::<Stamped>(r#"{"at":"yesterday"}"#).is_err());
    }
}
