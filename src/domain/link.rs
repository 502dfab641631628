use url::Url;

const YOUTUBE_HOSTS: &[&str] = &["youtube.com", "youtu.be", "youtube-nocookie.com"];
const ID_PATH_PREFIXES: &[&str] = &["shorts", "embed", "live", "v"];

fn parse_lenient(text: &str) -> Option<Url> {
    let text = text.trim();
    if text.is_empty() || text.contains(char::is_whitespace) {
        return None;
    }
    Url::parse(text)
        .ok()
        .filter(|u| u.has_host())
        .or_else(|| Url::parse(&format!("https://{}", text)).ok())
}

fn is_youtube_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    YOUTUBE_HOSTS
        .iter()
        .any(|h| host == *h || host.ends_with(&format!(".{}", h)))
}

fn looks_like_video_id(candidate: &str) -> bool {
    candidate.len() == 11
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn parse_youtube(text: &str) -> Option<Url> {
    let url = parse_lenient(text)?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.host_str().filter(|h| is_youtube_host(h))?;
    Some(url)
}

/// Accepts links on YouTube hosts (and their subdomains), with or without a scheme.
pub fn is_valid_youtube_url(text: &str) -> bool {
    parse_youtube(text).is_some()
}

pub fn extract_video_id(text: &str) -> Option<String> {
    let url = parse_youtube(text)?;
    let host = url.host_str()?.to_ascii_lowercase();
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());

    let candidate = if host == "youtu.be" || host.ends_with(".youtu.be") {
        segments.next().map(str::to_string)
    } else {
        match segments.next() {
            Some("watch") | None => url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned()),
            Some(prefix) if ID_PATH_PREFIXES.contains(&prefix) => segments.next().map(str::to_string),
            Some(_) => None,
        }
    }?;

    looks_like_video_id(&candidate).then_some(candidate)
}

pub fn canonical_watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

pub fn is_video_id(candidate: &str) -> bool {
    looks_like_video_id(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_youtube_links() {
        assert!(is_valid_youtube_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(is_valid_youtube_url("https://www.youtube.com/watch?v=XUoXE3bmDJY&t=42s"));
        assert!(is_valid_youtube_url("https://youtube.com/shorts/abc123"));
        assert!(is_valid_youtube_url("https://m.youtube.com/watch?v=XUoXE3bmDJY"));
        assert!(is_valid_youtube_url("https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ"));
        assert!(is_valid_youtube_url("youtu.be/dQw4w9WgXcQ"));
        assert!(is_valid_youtube_url("  https://youtu.be/dQw4w9WgXcQ  "));
    }

    #[test]
    fn test_rejects_lookalike_hosts_and_text() {
        assert!(!is_valid_youtube_url("https://notyoutube.com/watch?v=dQw4w9WgXcQ"));
        assert!(!is_valid_youtube_url("https://youtube.com.evil.example/watch?v=dQw4w9WgXcQ"));
        assert!(!is_valid_youtube_url("https://vimeo.com/12345"));
        assert!(!is_valid_youtube_url("hola, ¿qué tal?"));
        assert!(!is_valid_youtube_url("ftp://youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(!is_valid_youtube_url(""));
    }

    #[test]
    fn test_extract_video_id() {
        assert_eq!(extract_video_id("https://youtu.be/dQw4w9WgXcQ?si=xyz").as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?feature=share&v=XUoXE3bmDJY").as_deref(),
            Some("XUoXE3bmDJY")
        );
        assert_eq!(extract_video_id("youtube.com/shorts/aBcDeFgHiJk").as_deref(), Some("aBcDeFgHiJk"));
        assert_eq!(extract_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(extract_video_id("https://youtube.com/live/dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
    }

    #[test]
    fn test_extract_video_id_rejects_non_video_pages() {
        assert_eq!(extract_video_id("https://youtube.com/shorts/abc123"), None);
        assert_eq!(extract_video_id("https://www.youtube.com/@somechannel"), None);
        assert_eq!(extract_video_id("https://www.youtube.com/playlist?list=PL123"), None);
        assert_eq!(extract_video_id("https://vimeo.com/dQw4w9WgXcQ"), None);
    }

    #[test]
    fn test_canonical_url_round_trips_through_extraction() {
        let url = canonical_watch_url("dQw4w9WgXcQ");
        assert_eq!(extract_video_id(&url).as_deref(), Some("dQw4w9WgXcQ"));
    }
}
