use regex::Regex;

const SECONDS_PER_DAY: u64 = 86_400;
const SECONDS_PER_HOUR: u64 = 3_600;
const SECONDS_PER_MINUTE: u64 = 60;

lazy_static::lazy_static! {
    static ref DAYS_MATCHER: Regex = Regex::new(r"(?P<days>\d+)\s*day").expect("valid days pattern");
    static ref HOURS_MATCHER: Regex = Regex::new(r"(?P<hours>\d+)\s*hour").expect("valid hours pattern");
    static ref MINUTES_MATCHER: Regex = Regex::new(r"(?P<minutes>\d+)\s*min").expect("valid minutes pattern");
}

/// Converts free text such as `"7 days"` or `"1 day 3 hours"` into seconds.
///
/// Each unit is looked up independently and missing or unreadable fragments
/// contribute zero, so the result is never an error.
pub fn convert_to_seconds(text: &str) -> u64 {
    let days = capture_count(&DAYS_MATCHER, "days", text);
    let hours = capture_count(&HOURS_MATCHER, "hours", text);
    let minutes = capture_count(&MINUTES_MATCHER, "minutes", text);

    days.saturating_mul(SECONDS_PER_DAY)
        .saturating_add(hours.saturating_mul(SECONDS_PER_HOUR))
        .saturating_add(minutes.saturating_mul(SECONDS_PER_MINUTE))
}

fn capture_count(matcher: &Regex, group: &str, text: &str) -> u64 {
    matcher
        .captures(text)
        .and_then(|captures| captures.name(group))
        .and_then(|value| value.as_str().parse::<u64>().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::convert_to_seconds;

    #[test]
    fn converts_single_units() {
        assert_eq!(convert_to_seconds("7 days"), 604_800);
        assert_eq!(convert_to_seconds("8 hours"), 28_800);
        assert_eq!(convert_to_seconds("1 min"), 60);
        assert_eq!(convert_to_seconds("45 minutes"), 2_700);
    }

    #[test]
    fn sums_co_occurring_units() {
        assert_eq!(convert_to_seconds("7 days 8 hours"), 633_600);
        assert_eq!(convert_to_seconds("1 day 3 hours"), 97_200);
        assert_eq!(convert_to_seconds("2 days, 1 hour, 30 min"), 178_200);
    }

    #[test]
    fn unreadable_text_is_zero() {
        assert_eq!(convert_to_seconds(""), 0);
        assert_eq!(convert_to_seconds("0"), 0);
        assert_eq!(convert_to_seconds("unknown"), 0);
        assert_eq!(
            convert_to_seconds("99999999999999999999999 days"),
            0,
            "Counts that overflow should contribute nothing"
        );
    }
}
