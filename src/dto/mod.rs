use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod admin;
pub mod board;
pub mod health;
pub mod sse;

fn format_unix_ms(timestamp_ms: u64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(timestamp_ms) * 1_000_000)
        .ok()
        .and_then(|instant| instant.format(&Rfc3339).ok())
        .unwrap_or_else(|| "invalid-timestamp".into())
}
