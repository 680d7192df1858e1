use anyhow::Result;
use std::path::Path;

use crate::domain::models::MediaMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    Strict,
    Lenient,
}

pub trait Matcher {
    fn identify(&self, file_path: &Path, strictness: Strictness) -> Result<Option<MediaMetadata>>;
}

/// Never identifies anything; every file goes to manual entry.
pub struct ManualOnly;

impl Matcher for ManualOnly {
    fn identify(&self, _file_path: &Path, _strictness: Strictness) -> Result<Option<MediaMetadata>> {
        Ok(None)
    }
}

/// Strict first, then lenient. Matcher failures count as no match.
pub fn identify(matcher: &dyn Matcher, file_path: &Path) -> Option<MediaMetadata> {
    for strictness in [Strictness::Strict, Strictness::Lenient] {
        match matcher.identify(file_path, strictness) {
            Ok(Some(meta)) => return Some(meta),
            Ok(None) => {
                tracing::debug!("no {strictness:?} match for {file_path:?}");
            }
            Err(e) => {
                eprintln!("Matcher failed: {e:#}");
                return None;
            }
        }
    }
    None
}

pub mod filebot;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Movie;
    use anyhow::bail;
    use std::cell::RefCell;

    struct Recording {
        calls: RefCell<Vec<Strictness>>,
        answer_on: Option<Strictness>,
        fail: bool,
    }

    impl Matcher for Recording {
        fn identify(&self, _file_path: &Path, strictness: Strictness) -> Result<Option<MediaMetadata>> {
            self.calls.borrow_mut().push(strictness);
            if self.fail {
                bail!("not installed");
            }
            Ok((self.answer_on == Some(strictness)).then(|| {
                MediaMetadata::Movie(Movie {
                    title: "Heat".to_string(),
                    year: 1995,
                    external_id: None,
                })
            }))
        }
    }

    fn recording(answer_on: Option<Strictness>, fail: bool) -> Recording {
        Recording {
            calls: RefCell::new(Vec::new()),
            answer_on,
            fail,
        }
    }

    #[test]
    fn test_strict_match_skips_lenient() {
        let matcher = recording(Some(Strictness::Strict), false);
        assert!(identify(&matcher, Path::new("a.mkv")).is_some());
        assert_eq!(*matcher.calls.borrow(), vec![Strictness::Strict]);
    }

    #[test]
    fn test_falls_back_to_lenient() {
        let matcher = recording(Some(Strictness::Lenient), false);
        assert!(identify(&matcher, Path::new("a.mkv")).is_some());
        assert_eq!(
            *matcher.calls.borrow(),
            vec![Strictness::Strict, Strictness::Lenient]
        );
    }

    #[test]
    fn test_no_match_and_errors_are_not_fatal() {
        let matcher = recording(None, false);
        assert!(identify(&matcher, Path::new("a.mkv")).is_none());
        assert_eq!(matcher.calls.borrow().len(), 2);

        let broken = recording(None, true);
        assert!(identify(&broken, Path::new("a.mkv")).is_none());
        assert_eq!(broken.calls.borrow().len(), 1);

        assert!(identify(&ManualOnly, Path::new("a.mkv")).is_none());
    }
}
