//! Parses the encoder's textual progress output (`-progress pipe:1` style
//! `key=value` lines) into a time position, which is turned into a percentage
//! against the source duration.

pub(super) fn parse_progress_line(line: &str) -> Option<f64> {
    for token in line.split_whitespace() {
        if let Some(rest) = token.strip_prefix("out_time_ms=") {
            if let Ok(us) = rest.parse::<f64>() {
                return Some(us / 1_000_000.0);
            }
        } else if let Some(rest) = token.strip_prefix("out_time=") {
            return Some(parse_time_to_seconds(rest));
        }
    }
    None
}

pub(super) fn is_progress_end(line: &str) -> bool {
    line.split_whitespace()
        .any(|token| token.strip_prefix("progress=").is_some_and(|v| v == "end"))
}

pub(super) fn parse_time_to_seconds(s: &str) -> f64 {
    if let Some((h, rest)) = s.split_once(':') {
        if let Some((m, sec)) = rest.split_once(':') {
            let h: f64 = h.parse().unwrap_or(0.0);
            let m: f64 = m.parse().unwrap_or(0.0);
            let sec: f64 = sec.parse().unwrap_or(0.0);
            return h * 3600.0 + m * 60.0 + sec;
        }
    }
    s.parse().unwrap_or(0.0)
}

pub(super) fn percent(total_duration_sec: f64, elapsed_sec: f64) -> u8 {
    if !total_duration_sec.is_finite() || total_duration_sec <= 0.0 {
        return 0;
    }
    let elapsed = if elapsed_sec.is_finite() && elapsed_sec > 0.0 {
        elapsed_sec
    } else {
        0.0
    };
    let ratio = (elapsed / total_duration_sec * 100.0).clamp(0.0, 100.0);
    ratio as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_out_time_ms() {
        assert_eq!(parse_progress_line("out_time_ms=45000000"), Some(45.0));
    }

    #[test]
    fn parses_out_time_hms() {
        assert_eq!(parse_progress_line("out_time=00:01:30.000000"), Some(90.0));
    }

    #[test]
    fn detects_progress_end() {
        assert!(is_progress_end("progress=end"));
        assert!(!is_progress_end("progress=continue"));
    }

    #[test]
    fn clamps_percent_to_100() {
        assert_eq!(percent(10.0, 50.0), 100);
        assert_eq!(percent(10.0, 5.0), 50);
        assert_eq!(percent(0.0, 5.0), 0);
    }
}
