use std::panic::AssertUnwindSafe;

/// Pre-ingest gate. Rejects empty, too-short, or error-page-like content
/// before any chunking or embedding work happens; no partial write ever
/// results from a rejected document.
pub struct Validator {
    min_length: usize,
}

/// Reasons a document was rejected, surfaced verbatim to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    Empty,
    TooShort,
    ErrorPageLike,
    InvalidTitle,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::Empty => "empty",
            RejectionReason::TooShort => "too_short",
            RejectionReason::ErrorPageLike => "error_page_like",
            RejectionReason::InvalidTitle => "invalid_title",
        }
    }
}

/// Document title bound: non-empty, at most this many characters.
pub const MAX_TITLE_CHARS: usize = 500;

/// Checks the title invariant independently of content validation, since a
/// title is a property of the document spec rather than of the content
/// body `Validator::validate` inspects.
pub fn validate_title(title: &str) -> Result<(), RejectionReason> {
    if title.trim().is_empty() || title.chars().count() > MAX_TITLE_CHARS {
        return Err(RejectionReason::InvalidTitle);
    }
    Ok(())
}

/// Case-insensitive substrings that, combined with a short body, mark a
/// fetched page as a failed fetch rather than real content.
const ERROR_PAGE_MARKERS: &[&str] = &[
    "404 not found",
    "403 forbidden",
    "access denied",
    "page not found",
    "this page doesn't exist",
    "content not available",
];

const ERROR_PAGE_MAX_LENGTH: usize = 1_000;

impl Validator {
    pub fn new(min_length: usize) -> Self {
        Self { min_length }
    }

    /// Runs under `catch_unwind` so a panic validating one document in a
    /// batch ingest (e.g. a pathological regex input) cannot abort the rest
    /// of the batch, mirroring `indexing.rs`'s per-item panic isolation.
    pub fn validate(&self, content: &str) -> Result<(), RejectionReason> {
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| self.validate_inner(content)));
        outcome.unwrap_or(Err(RejectionReason::ErrorPageLike))
    }

    fn validate_inner(&self, content: &str) -> Result<(), RejectionReason> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(RejectionReason::Empty);
        }
        if trimmed.len() < self.min_length {
            return Err(RejectionReason::TooShort);
        }

        let lower = trimmed.to_lowercase();
        if trimmed.len() < ERROR_PAGE_MAX_LENGTH && ERROR_PAGE_MARKERS.iter().any(|m| lower.contains(m)) {
            return Err(RejectionReason::ErrorPageLike);
        }

        Ok(())
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_after_trim() {
        let validator = Validator::new(100);
        assert_eq!(validator.validate("   \n\t  "), Err(RejectionReason::Empty));
    }

    #[test]
    fn rejects_below_minimum_length() {
        let validator = Validator::new(100);
        assert_eq!(validator.validate("short"), Err(RejectionReason::TooShort));
    }

    #[test]
    fn rejects_short_error_page() {
        let validator = Validator::new(10);
        let content = "404 Not Found";
        assert_eq!(validator.validate(content), Err(RejectionReason::ErrorPageLike));
    }

    #[test]
    fn accepts_long_page_even_if_it_mentions_an_error_marker() {
        let validator = Validator::new(10);
        let content = format!("{} {}", "a".repeat(1_200), "this page was once a 404 not found error but has real content now");
        assert!(validator.validate(&content).is_ok());
    }

    #[test]
    fn accepts_ordinary_content() {
        let validator = Validator::new(100);
        let content = "Lorem ipsum dolor sit amet, ".repeat(10);
        assert!(validator.validate(&content).is_ok());
    }
}
