const FORBIDDEN_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const MAX_FILENAME_CHARS: usize = 50;
pub const UNTITLED: &str = "video_sin_titulo";

/// Strips characters that break file systems or HTML, joins words with `_`
/// and keeps at most 50 characters.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !FORBIDDEN_FILENAME_CHARS.contains(c))
        .collect();

    let joined = cleaned.split_whitespace().collect::<Vec<_>>().join("_");
    let truncated: String = joined.chars().take(MAX_FILENAME_CHARS).collect();

    if truncated.is_empty() {
        UNTITLED.to_string()
    } else {
        truncated
    }
}

pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} TB", size)
}

pub fn format_duration(seconds: i64) -> String {
    if seconds < 0 {
        return "0:00".to_string();
    }
    let (mins, secs) = (seconds / 60, seconds % 60);
    let (hours, mins) = (mins / 60, mins % 60);
    if hours > 0 {
        format!("{}h {}m {}s", hours, mins, secs)
    } else {
        format!("{}m {}s", mins, secs)
    }
}

/// `1234567` -> `1,234,567`
pub fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Wait time as `{h}h {m}m`.
pub fn format_wait(seconds: u64) -> String {
    format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
}

pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("  Rick Astley - Never   Gonna <Give> You Up?  "), "Rick_Astley_-_Never_Gonna_Give_You_Up");
        assert_eq!(sanitize_filename("a/b\\c:d*e|f\"g"), "abcdefg");
        assert_eq!(sanitize_filename("???"), UNTITLED);
        assert_eq!(sanitize_filename(""), UNTITLED);
        assert_eq!(sanitize_filename(&"á".repeat(80)).chars().count(), 50);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0.0 B");
        assert_eq!(format_size(512), "512.0 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(49 * 1024 * 1024), "49.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
        assert_eq!(format_size(2 * 1024 * 1024 * 1024 * 1024), "2.0 TB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(-5), "0:00");
        assert_eq!(format_duration(0), "0m 0s");
        assert_eq!(format_duration(212), "3m 32s");
        assert_eq!(format_duration(3725), "1h 2m 5s");
    }

    #[test]
    fn test_format_count_and_wait() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1_234_567), "1,234,567");
        assert_eq!(format_wait(3599), "0h 59m");
        assert_eq!(format_wait(3720), "1h 2m");
    }
}
