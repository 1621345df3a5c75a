//! Exclusion rules for stream recording.

use regex::Regex;

use crate::collector::stream::CallSite;

/// Rules that suppress recording of a stream operation.
///
/// Any single match suppresses the record. Filters never affect delegation:
/// the real operation always runs.
#[derive(Debug, Clone, Default)]
pub struct StreamFilters {
    ignored_path_patterns: Vec<Regex>,
    ignored_classes: Vec<String>,
    ignored_urls: Vec<String>,
}

impl StreamFilters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Regex patterns matched against the target URI and the caller's source file.
    ///
    /// # Errors
    /// Returns the first pattern that fails to compile.
    pub fn with_ignored_path_patterns<I, S>(mut self, patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            self.ignored_path_patterns.push(Regex::new(pattern.as_ref())?);
        }
        Ok(self)
    }

    /// Caller types whose operations are not recorded.
    ///
    /// Matches the full type path or its trailing segments
    /// (`Downloader` matches `app::net::Downloader`).
    pub fn with_ignored_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_classes.extend(classes.into_iter().map(Into::into));
        self
    }

    /// Substrings of URIs that are not recorded.
    pub fn with_ignored_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_urls.extend(urls.into_iter().map(Into::into));
        self
    }

    /// Whether an operation on `uri` from `caller` must not be recorded.
    pub fn is_ignored(&self, uri: &str, caller: &CallSite) -> bool {
        self.matches_path(uri, caller) || self.matches_class(caller) || self.matches_url(uri)
    }

    pub fn is_empty(&self) -> bool {
        self.ignored_path_patterns.is_empty()
            && self.ignored_classes.is_empty()
            && self.ignored_urls.is_empty()
    }

    fn matches_path(&self, uri: &str, caller: &CallSite) -> bool {
        self.ignored_path_patterns.iter().any(|pattern| {
            pattern.is_match(uri)
                || caller
                    .file
                    .as_deref()
                    .is_some_and(|file| pattern.is_match(file))
        })
    }

    fn matches_class(&self, caller: &CallSite) -> bool {
        let Some(type_name) = caller.type_name else {
            return false;
        };
        self.ignored_classes.iter().any(|class| {
            type_name == class
                || type_name
                    .strip_suffix(class.as_str())
                    .is_some_and(|prefix| prefix.ends_with("::"))
        })
    }

    fn matches_url(&self, uri: &str) -> bool {
        self.ignored_urls.iter().any(|url| uri.contains(url.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Downloader;

    #[test]
    fn test_empty_filters_ignore_nothing() {
        let filters = StreamFilters::new();
        assert!(filters.is_empty());
        assert!(!filters.is_ignored("http://example.com", &CallSite::of::<Downloader>()));
    }

    #[test]
    fn test_path_pattern_matches_uri() {
        let filters = StreamFilters::new()
            .with_ignored_path_patterns([r"/vendor/"])
            .unwrap();
        assert!(filters.is_ignored("/app/vendor/lib.rs", &CallSite::unknown()));
        assert!(!filters.is_ignored("/app/src/lib.rs", &CallSite::unknown()));
    }

    #[test]
    fn test_path_pattern_matches_caller_file() {
        let filters = StreamFilters::new()
            .with_ignored_path_patterns(["filters"])
            .unwrap();
        assert!(filters.is_ignored("http://example.com", &CallSite::here()));
        assert!(!filters.is_ignored("http://example.com", &CallSite::unknown()));
    }

    #[test]
    fn test_invalid_path_pattern() {
        assert!(StreamFilters::new().with_ignored_path_patterns(["("]).is_err());
    }

    #[test]
    fn test_class_matches_full_and_short_name() {
        let full = StreamFilters::new().with_ignored_classes([std::any::type_name::<Downloader>()]);
        let short = StreamFilters::new().with_ignored_classes(["Downloader"]);
        let partial = StreamFilters::new().with_ignored_classes(["loader"]);
        let site = CallSite::of::<Downloader>();

        assert!(full.is_ignored("file:///tmp/x", &site));
        assert!(short.is_ignored("file:///tmp/x", &site));
        assert!(!partial.is_ignored("file:///tmp/x", &site));
        assert!(!short.is_ignored("file:///tmp/x", &CallSite::here()));
    }

    #[test]
    fn test_url_substring() {
        let filters = StreamFilters::new().with_ignored_urls(["example"]);
        assert!(filters.is_ignored("http://example.com/a", &CallSite::unknown()));
        assert!(!filters.is_ignored("http://rust-lang.org", &CallSite::unknown()));
    }
}
