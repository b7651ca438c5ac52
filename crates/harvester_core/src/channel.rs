use url::Url;

/// Reduce a raw channel reference to the provider's channel id.
///
/// Accepts bare ids and `youtube.com/channel/<id>` URLs. Returns `None` for blank
/// input or URLs that do not name a channel.
pub fn normalize_channel_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if !trimmed.contains("://") {
        if trimmed.chars().any(char::is_whitespace) {
            return None;
        }
        return Some(trimmed.to_string());
    }

    let parsed = Url::parse(trimmed).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    if !matches!(
        host.as_str(),
        "youtube.com" | "www.youtube.com" | "m.youtube.com"
    ) {
        return None;
    }

    let mut segments = parsed.path_segments()?;
    match (segments.next(), segments.next()) {
        (Some("channel"), Some(id)) if !id.is_empty() => Some(id.to_string()),
        _ => None,
    }
}

/// Normalize a list of channel references, dropping blanks and repeats but keeping order.
pub fn normalize_channel_ids<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    raw.into_iter()
        .filter_map(|item| normalize_channel_id(item.as_ref()))
        .filter(|id| seen.insert(id.clone()))
        .collect()
}
