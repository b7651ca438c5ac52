use crate::{DurationFlags, HarvestOptions, VideoCandidate};

/// View, duration and keyword gate applied to detail-batch results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFilter {
    min_views: u64,
    max_views: Option<u64>,
    durations: DurationFlags,
    keywords: Vec<String>,
    exclude_keywords: Vec<String>,
}

impl CandidateFilter {
    pub fn from_options(options: &HarvestOptions) -> Self {
        Self {
            min_views: options.min_views,
            max_views: options.max_views,
            durations: options.durations,
            keywords: lowercase_all(&options.keywords),
            exclude_keywords: lowercase_all(&options.exclude_keywords),
        }
    }

    pub fn accepts(&self, candidate: &VideoCandidate) -> bool {
        self.accepts_views(candidate.view_count)
            && self.durations.allows(candidate.duration_class)
            && self.accepts_keywords(candidate)
    }

    pub fn accepts_views(&self, views: u64) -> bool {
        views >= self.min_views && self.max_views.is_none_or(|max| views <= max)
    }

    fn accepts_keywords(&self, candidate: &VideoCandidate) -> bool {
        if self.keywords.is_empty() && self.exclude_keywords.is_empty() {
            return true;
        }
        let haystack = searchable_text(candidate);
        if self
            .exclude_keywords
            .iter()
            .any(|word| haystack.contains(word.as_str()))
        {
            return false;
        }
        self.keywords.is_empty()
            || self
                .keywords
                .iter()
                .any(|word| haystack.contains(word.as_str()))
    }
}

fn searchable_text(candidate: &VideoCandidate) -> String {
    let mut text = String::with_capacity(
        candidate.title.len() + candidate.description.len() + 16 * candidate.tags.len(),
    );
    text.push_str(&candidate.title);
    text.push('\n');
    text.push_str(&candidate.description);
    for tag in &candidate.tags {
        text.push('\n');
        text.push_str(tag);
    }
    text.to_lowercase()
}

fn lowercase_all(words: &[String]) -> Vec<String> {
    words
        .iter()
        .map(|word| word.trim().to_lowercase())
        .filter(|word| !word.is_empty())
        .collect()
}
