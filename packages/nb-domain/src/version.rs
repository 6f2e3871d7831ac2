use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::Result;

/// Current UTC instant as an RFC 3339 stamp with nanosecond precision.
pub fn now() -> Result<String> {
	format(OffsetDateTime::now_utc())
}

pub fn format(at: OffsetDateTime) -> Result<String> {
	Ok(at.to_offset(time::UtcOffset::UTC).format(&Rfc3339)?)
}

/// Returns `None` for anything that is not an RFC 3339 timestamp.
pub fn parse(version: &str) -> Option<OffsetDateTime> {
	OffsetDateTime::parse(version.trim(), &Rfc3339).ok()
}
