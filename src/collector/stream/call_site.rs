//! Calling context of a stream operation.

use std::panic::Location;

/// Where a stream operation came from.
///
/// `file` is captured with `#[track_caller]`; `type_name` is only known when
/// the caller identifies itself (see [`CallSite::of`]).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallSite {
    pub file: Option<String>,
    pub type_name: Option<&'static str>,
}

impl CallSite {
    /// The source location of the caller.
    #[track_caller]
    pub fn here() -> Self {
        Self {
            file: Some(Location::caller().file().to_owned()),
            type_name: None,
        }
    }

    /// The source location of the caller, acting on behalf of `T`.
    #[track_caller]
    pub fn of<T: ?Sized>() -> Self {
        Self {
            type_name: Some(std::any::type_name::<T>()),
            ..Self::here()
        }
    }

    /// A call site with no known context.
    pub fn unknown() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Downloader;

    #[test]
    fn test_here_captures_file() {
        let site = CallSite::here();
        assert!(site.file.unwrap().ends_with("call_site.rs"));
        assert!(site.type_name.is_none());
    }

    #[test]
    fn test_of_captures_type() {
        let site = CallSite::of::<Downloader>();
        assert!(site.type_name.unwrap().ends_with("Downloader"));
        assert!(site.file.is_some());
    }

    #[test]
    fn test_unknown_is_empty() {
        assert_eq!(CallSite::unknown(), CallSite::default());
    }
}
