use chrono::{DateTime, Utc};
use mongodb::bson::DateTime as BsonDateTime;

pub fn now() -> BsonDateTime {
    BsonDateTime::now()
}

/// RFC 3339 rendering for API responses; persisted values stay as BSON dates.
pub fn bson_to_iso(dt: BsonDateTime) -> String {
    let chrono_dt: DateTime<Utc> = DateTime::from_timestamp_millis(dt.timestamp_millis())
        .unwrap_or_else(Utc::now);
    chrono_dt.to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_rfc3339() {
        let iso = bson_to_iso(BsonDateTime::from_millis(0));
        assert!(iso.starts_with("1970-01-01T00:00:00"));
    }
}
