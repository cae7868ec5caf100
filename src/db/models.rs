use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use serde_json::Value;

/// A persisted stats document as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StatsRecord {
    pub fn new(id: String, stats: NewStats, now: DateTime<Utc>) -> Self {
        Self {
            id,
            container: stats.container,
            paper: stats.paper,
            other: stats.other,
            created_at: now,
            updated_at: now,
        }
    }

    /// Counts with absent fields read as zero.
    pub fn counts(&self) -> NewStats {
        NewStats {
            container: Some(self.container.unwrap_or(0)),
            paper: Some(self.paper.unwrap_or(0)),
            other: Some(self.other.unwrap_or(0)),
        }
    }
}

/// Insert payload. Unknown fields are ignored and every counter is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewStats {
    #[serde(default, deserialize_with = "cast_count")]
    pub container: Option<i64>,
    #[serde(default, deserialize_with = "cast_count")]
    pub paper: Option<i64>,
    #[serde(default, deserialize_with = "cast_count")]
    pub other: Option<i64>,
}

impl NewStats {
    /// Parses a request body. An empty body is an empty document.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
    }

    /// Adds `delta` to `self`, treating absent counters as zero.
    pub fn checked_add(&self, delta: &NewStats) -> Option<NewStats> {
        let add = |a: Option<i64>, b: Option<i64>| a.unwrap_or(0).checked_add(b.unwrap_or(0));
        Some(NewStats {
            container: Some(add(self.container, delta.container)?),
            paper: Some(add(self.paper, delta.paper)?),
            other: Some(add(self.other, delta.other)?),
        })
    }
}

// Numbers, integral floats and numeric strings cast to a count; null and "" mean unset.
fn cast_count<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| f as i64)
            })
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("Cast to Number failed for value {}", n))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("Cast to Number failed for value \"{}\"", s))),
        Some(other) => Err(D::Error::custom(format!(
            "Cast to Number failed for value {}",
            other
        ))),
    }
}

/// Current time truncated to milliseconds, the resolution both stores keep.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Result<NewStats, serde_json::Error> {
        NewStats::from_slice(value.to_string().as_bytes())
    }

    #[test]
    fn casts_numbers_and_numeric_strings() {
        let stats = parse(json!({
            "container": 3,
            "paper": "5",
            "other": 2.0
        }))
        .unwrap();
        assert_eq!(
            stats,
            NewStats {
                container: Some(3),
                paper: Some(5),
                other: Some(2),
            }
        );
    }

    #[test]
    fn missing_null_and_unknown_fields() {
        let stats = parse(json!({
            "container": null,
            "paper": "",
            "glass": 12
        }))
        .unwrap();
        assert_eq!(stats, NewStats::default());
    }

    #[test]
    fn rejects_values_that_do_not_cast() {
        let err = parse(json!({ "paper": "lots" })).unwrap_err();
        assert!(err.to_string().contains("Cast to Number failed"));

        assert!(parse(json!({ "other": 1.5 })).is_err());
        assert!(parse(json!({ "container": [1] })).is_err());
    }

    #[test]
    fn record_serializes_with_document_field_names() {
        let now = DateTime::parse_from_rfc3339("2024-03-01T12:30:00.250Z")
            .unwrap()
            .with_timezone(&Utc);
        let record = StatsRecord::new(
            "65e1c9f0a1b2c3d4e5f60718".to_string(),
            NewStats {
                container: Some(1),
                paper: None,
                other: Some(0),
            },
            now,
        );

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "_id": "65e1c9f0a1b2c3d4e5f60718",
                "container": 1,
                "other": 0,
                "createdAt": "2024-03-01T12:30:00.250Z",
                "updatedAt": "2024-03-01T12:30:00.250Z"
            })
        );
    }

    #[test]
    fn checked_add_treats_missing_as_zero() {
        let base = NewStats {
            container: Some(4),
            paper: None,
            other: Some(1),
        };
        let delta = NewStats {
            container: Some(1),
            paper: Some(2),
            other: None,
        };
        assert_eq!(
            base.checked_add(&delta),
            Some(NewStats {
                container: Some(5),
                paper: Some(2),
                other: Some(1),
            })
        );

        let full = NewStats {
            container: Some(i64::MAX),
            ..Default::default()
        };
        assert_eq!(full.checked_add(&delta), None);
    }

    #[test]
    fn empty_body_is_an_empty_document() {
        assert_eq!(NewStats::from_slice(b"").unwrap(), NewStats::default());
        assert_eq!(NewStats::from_slice(b" \n").unwrap(), NewStats::default());
    }

    #[test]
    fn malformed_body_is_rejected() {
        assert!(NewStats::from_slice(b"{\"paper\": 3").is_err());
        assert!(NewStats::from_slice(b"paper=3").is_err());
    }

    #[test]
    fn now_millis_drops_sub_millisecond_precision() {
        let now = now_millis();
        assert_eq!(now.timestamp_subsec_nanos() % 1_000_000, 0);
    }
}
