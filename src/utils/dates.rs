use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime};

/// Dates go over the wire as `YYYY-MM-DD`
pub const WIRE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Default loan period in calendar days
pub const DEFAULT_LOAN_PERIOD_DAYS: u32 = 7;

/// Today's calendar date in the user's local time zone.
///
/// Borrow dates and lateness are counted in the days the user sees on their
/// own calendar, not UTC days.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn format_wire_date(date: NaiveDate) -> String {
    date.format(WIRE_DATE_FORMAT).to_string()
}

/// Parse a date sent by the server.
///
/// The API is not consistent: borrow dates come back as plain dates, return
/// dates often as full timestamps. Only the calendar day is kept.
pub fn parse_wire_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(raw, WIRE_DATE_FORMAT) {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }

    raw.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, WIRE_DATE_FORMAT).ok())
}

/// Due date for a loan starting on `borrow_date`
pub fn due_date_for(borrow_date: NaiveDate, loan_period_days: u32) -> NaiveDate {
    borrow_date + Duration::days(i64::from(loan_period_days))
}

/// Serde adapter for required wire dates
pub mod wire_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_wire_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_wire_date(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {}", raw)))
    }
}

/// Serde adapter for optional wire dates. Null, empty and unparseable values
/// all read as `None`.
pub mod wire_date_opt {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        date: &Option<NaiveDate>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => serializer.serialize_str(&super::format_wire_date(*d)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDate>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(super::parse_wire_date))
    }
}
