use chrono::{DateTime, Local, Utc};

/// Timestamp embedded in result file names: `dd-mm-yyyy-hh-mm-ss`
pub fn file_timestamp(now: DateTime<Local>) -> String {
    now.format("%d-%m-%Y-%H-%M-%S").to_string()
}

/// Identifier for one run: `exec_<yyyymmddThhmmss>_<8 hex chars>`
pub fn execution_id(now: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("exec_{}_{}", now.format("%Y%m%dT%H%M%S"), &suffix[..8])
}

pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        let minutes = ms / 60000;
        let seconds = (ms % 60000) as f64 / 1000.0;
        format!("{}m {:.0}s", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_file_timestamp_format() {
        let at = Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 1).unwrap();
        assert_eq!(file_timestamp(at), "07-03-2024-09-05-01");
    }

    #[test]
    fn test_execution_id_shape() {
        let at = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 1).unwrap();
        let id = execution_id(at);
        assert!(id.starts_with("exec_20240307T090501_"));
        assert_eq!(id.len(), "exec_20240307T090501_".len() + 8);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(450), "450ms");
        assert_eq!(format_duration(2500), "2.5s");
        assert_eq!(format_duration(125000), "2m 5s");
    }
}
