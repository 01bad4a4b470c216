use chrono::{DateTime, NaiveDateTime, Utc};

/// Zone-less RFC-2822 layouts. Values parsed with these are taken as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%a, %d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
    "%a, %d %b %Y %H:%M",
    "%d %b %Y %H:%M",
];

/// Parses a feed publication date into a UTC instant.
///
/// Accepts RFC-2822 (the RSS `pubDate` format, including obsolete zone names
/// such as `GMT`), RFC-2822 without a zone (assumed UTC), and RFC-3339 as
/// used by Atom `published`/`updated` elements.
///
/// Returns `None` for anything that cannot be parsed. Callers treat this as
/// "no date known", never as a failure.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    // Feeds regularly ship a weekday that disagrees with the date, which
    // chrono rejects. Retry without the weekday.
    let without_weekday = strip_weekday(trimmed);
    if without_weekday.len() != trimmed.len() {
        if let Ok(dt) = DateTime::parse_from_rfc2822(without_weekday) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(naive.and_utc());
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    tracing::debug!(date = %trimmed, "Unparseable publication date");
    None
}

/// Drops a leading `"Xxx, "` weekday token if present.
fn strip_weekday(s: &str) -> &str {
    match s.split_once(',') {
        Some((day, rest)) if day.len() <= 9 && day.chars().all(|c| c.is_ascii_alphabetic()) => {
            rest.trim_start()
        }
        _ => s,
    }
}
