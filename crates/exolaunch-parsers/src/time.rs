//! Walltime parsing and formatting for Slurm directives.

use std::time::Duration;

/// Parse a Slurm walltime.
///
/// Supports:
/// - D-HH:MM:SS
/// - HH:MM:SS
/// - MM:SS
/// - Minutes as integer (Slurm reads a bare number as minutes)
///
/// Returns None for "UNLIMITED", empty strings or unparseable input.
pub fn parse_walltime(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() || s == "UNLIMITED" || s == "-" {
        return None;
    }

    let (days, time_part) = match s.split_once('-') {
        Some((d, rest)) => (d.parse::<u64>().ok()?, rest),
        None => (0, s),
    };

    let time_parts = time_part
        .split(':')
        .map(|p| p.parse::<u64>().ok())
        .collect::<Option<Vec<u64>>>()?;

    let seconds = match time_parts.as_slice() {
        [h, m, s] => h
            .checked_mul(3600)?
            .checked_add(m.checked_mul(60)?)?
            .checked_add(*s)?,
        [m, s] => m.checked_mul(60)?.checked_add(*s)?,
        [m] if days == 0 => m.checked_mul(60)?,
        // D-HH
        [h] => h.checked_mul(3600)?,
        _ => return None,
    };

    Some(Duration::from_secs(days.checked_mul(86400)?.checked_add(seconds)?))
}

/// Format seconds as Slurm walltime (D-HH:MM:SS or HH:MM:SS).
pub fn format_walltime(seconds: u64) -> String {
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if days > 0 {
        format!("{}-{:02}:{:02}:{:02}", days, hours, mins, secs)
    } else {
        format!("{:02}:{:02}:{:02}", hours, mins, secs)
    }
}

/// Format a job length given in minutes as Slurm walltime.
pub fn walltime_from_minutes(minutes: u64) -> String {
    format_walltime(minutes.saturating_mul(60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_walltime() {
        assert_eq!(parse_walltime("1:00:00"), Some(Duration::from_secs(3600)));
        assert_eq!(
            parse_walltime("1-00:00:00"),
            Some(Duration::from_secs(86400))
        );
        assert_eq!(parse_walltime("30:00"), Some(Duration::from_secs(1800)));
        assert_eq!(parse_walltime("90"), Some(Duration::from_secs(5400)));
        assert_eq!(parse_walltime("2-12"), Some(Duration::from_secs(216000)));
        assert!(parse_walltime("UNLIMITED").is_none());
        assert!(parse_walltime("1:xx:00").is_none());
        assert!(parse_walltime("").is_none());
    }

    #[test]
    fn test_parse_walltime_overflow() {
        assert!(parse_walltime("18446744073709551615:00:00").is_none());
        assert!(parse_walltime("18446744073709551615-00:00:00").is_none());
        assert!(parse_walltime("307445734561825861").is_none());
    }

    #[test]
    fn test_format_walltime() {
        assert_eq!(format_walltime(59), "00:00:59");
        assert_eq!(format_walltime(3600 + 120 + 5), "01:02:05");
        assert_eq!(format_walltime(86400 + 3600), "1-01:00:00");
    }

    #[test]
    fn test_walltime_from_minutes() {
        assert_eq!(walltime_from_minutes(90), "01:30:00");
        assert_eq!(walltime_from_minutes(24 * 60), "1-00:00:00");
        assert!(walltime_from_minutes(u64::MAX).ends_with(":15"));
    }
}
