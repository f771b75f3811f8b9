use std::time::Duration;

/// Format an elapsed duration as `H:MM:SS`; hours are not wrapped at 24.
pub fn fmt_elapsed(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_hours_minutes_seconds() {
        assert_eq!(fmt_elapsed(Duration::from_secs(0)), "0:00:00");
        assert_eq!(fmt_elapsed(Duration::from_secs(59)), "0:00:59");
        assert_eq!(fmt_elapsed(Duration::from_secs(3600 + 2 * 60 + 3)), "1:02:03");
        assert_eq!(fmt_elapsed(Duration::from_millis(1999)), "0:00:01");
    }

    #[test]
    fn hours_run_past_a_day() {
        assert_eq!(fmt_elapsed(Duration::from_secs(30 * 3600)), "30:00:00");
    }
}
