//! Keyset cursor encoding for time-ordered history.
//!
//! History tables are paged by `(timestamp, id)` so rows sharing a timestamp
//! are neither skipped nor repeated between pages.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Error type for cursor operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CursorError {
    #[error("Invalid cursor format")]
    InvalidFormat,
    #[error("Invalid cursor encoding")]
    InvalidEncoding,
    #[error("Invalid timestamp in cursor")]
    InvalidTimestamp,
    #[error("Invalid ID in cursor")]
    InvalidId,
}

/// Position of the last row returned by a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub timestamp: DateTime<Utc>,
    pub id: i64,
}

impl Cursor {
    pub fn new(timestamp: DateTime<Utc>, id: i64) -> Self {
        Self { timestamp, id }
    }

    /// Encodes the cursor as base64(RFC3339_timestamp:id).
    pub fn encode(&self) -> String {
        let raw = format!(
            "{}:{}",
            self.timestamp
                .to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
            self.id
        );
        URL_SAFE_NO_PAD.encode(raw.as_bytes())
    }

    /// Decodes an opaque cursor string.
    pub fn decode(cursor: &str) -> Result<Self, CursorError> {
        let decoded = URL_SAFE_NO_PAD
            .decode(cursor)
            .map_err(|_| CursorError::InvalidEncoding)?;
        let s = String::from_utf8(decoded).map_err(|_| CursorError::InvalidFormat)?;

        // The timestamp itself contains colons
        let colon_pos = s.rfind(':').ok_or(CursorError::InvalidFormat)?;
        let (timestamp_str, id_str) = (&s[..colon_pos], &s[colon_pos + 1..]);

        let id: i64 = id_str.parse().map_err(|_| CursorError::InvalidId)?;
        let timestamp = DateTime::parse_from_rfc3339(timestamp_str)
            .map_err(|_| CursorError::InvalidTimestamp)?
            .with_timezone(&Utc);

        Ok(Self { timestamp, id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_cursor_preserves_microseconds() {
        let timestamp = Utc
            .with_ymd_and_hms(2026, 3, 2, 14, 30, 45)
            .unwrap()
            .with_nanosecond(123_456_000)
            .unwrap();
        let cursor = Cursor::new(timestamp, 42);

        let decoded = Cursor::decode(&cursor.encode()).unwrap();
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn test_decode_invalid_base64() {
        assert_eq!(
            Cursor::decode("not-valid-base64!!!"),
            Err(CursorError::InvalidEncoding)
        );
    }

    #[test]
    fn test_decode_missing_colon() {
        let invalid = URL_SAFE_NO_PAD.encode(b"no-colon-here");
        assert_eq!(Cursor::decode(&invalid), Err(CursorError::InvalidFormat));
    }

    #[test]
    fn test_decode_invalid_id() {
        let invalid = URL_SAFE_NO_PAD.encode(b"2026-01-15T10:30:00Z:not-a-number");
        assert_eq!(Cursor::decode(&invalid), Err(CursorError::InvalidId));
    }

    #[test]
    fn test_decode_invalid_timestamp() {
        let invalid = URL_SAFE_NO_PAD.encode(b"not-a-timestamp:12345");
        assert_eq!(Cursor::decode(&invalid), Err(CursorError::InvalidTimestamp));
    }

    #[test]
    fn test_cursor_is_url_safe() {
        let encoded = Cursor::new(Utc::now(), 12345).encode();
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        assert!(!encoded.contains('='));
    }
}
