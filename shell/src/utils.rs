//! Date parsing and formatting, escape sequences and line splitting
//! shared by the builtins.

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// `ls -l` timestamp: `Jan  5 14:03` within the current year, `Jan  5  2023`
/// otherwise.
pub(crate) fn format_mtime(mtime: DateTime<Utc>) -> String {
    let local = mtime.with_timezone(&Local);
    if local.year() == Local::now().year() {
        local.format("%b %e %H:%M").to_string()
    } else {
        local.format("%b %e  %Y").to_string()
    }
}

/// Dates accepted by `touch -d` and `find -newermt`: RFC 3339, or
/// `YYYY-MM-DD` with an optional `HH:MM[:SS]` in local time.
pub(crate) fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    const FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"];
    let naive = FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    local_to_utc(naive)
}

/// `touch -t` stamp: `[[CC]YY]MMDDhhmm[.ss]` in local time.
pub(crate) fn parse_touch_stamp(stamp: &str) -> Option<DateTime<Utc>> {
    let (main, seconds) = match stamp.split_once('.') {
        Some((main, ss)) => (main, ss.parse::<u32>().ok()?),
        None => (stamp, 0),
    };
    if !main.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let num = |s: &str| s.parse::<u32>().ok();
    let (year, rest) = match main.len() {
        8 => (Local::now().year(), main),
        10 => {
            let yy = i32::try_from(num(&main[..2])?).ok()?;
            (if yy < 69 { 2000 + yy } else { 1900 + yy }, &main[2..])
        }
        12 => (i32::try_from(num(&main[..4])?).ok()?, &main[4..]),
        _ => return None,
    };
    let naive = NaiveDate::from_ymd_opt(year, num(&rest[..2])?, num(&rest[2..4])?)?
        .and_hms_opt(num(&rest[4..6])?, num(&rest[6..8])?, seconds)?;
    local_to_utc(naive)
}

fn local_to_utc(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Lines of `text`, treating a single trailing newline as a terminator.
pub(crate) fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    text.strip_suffix('\n').unwrap_or(text).split('\n').collect()
}

pub(crate) fn interpret_escape_sequences(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('\\') => result.push('\\'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn parses_dates() {
        assert!(parse_date("2024-03-01").is_some());
        assert!(parse_date("2024-03-01 12:30").is_some());
        assert_eq!(
            parse_date("2024-03-01T10:00:00Z").unwrap().hour(),
            10
        );
        assert!(parse_date("yesterday").is_none());
    }

    #[test]
    fn parses_touch_stamps() {
        let full = parse_touch_stamp("202403011230.45").unwrap().with_timezone(&Local);
        assert_eq!((full.year(), full.month(), full.day()), (2024, 3, 1));
        assert_eq!((full.hour(), full.minute(), full.second()), (12, 30, 45));

        let short = parse_touch_stamp("2403011230").unwrap().with_timezone(&Local);
        assert_eq!(short.year(), 2024);

        assert!(parse_touch_stamp("0301").is_none());
        assert!(parse_touch_stamp("20241301x000").is_none());
    }

    #[test]
    fn line_splitting() {
        assert_eq!(split_lines("a\nb\n"), vec!["a", "b"]);
        assert_eq!(split_lines("a\n\nb"), vec!["a", "", "b"]);
        assert!(split_lines("").is_empty());
    }

    #[test]
    fn escapes() {
        assert_eq!(interpret_escape_sequences(r"a\nb\tc\\d\q"), "a\nb\tc\\d\\q");
    }
}
