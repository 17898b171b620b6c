//! Content locators handed to workers.

use std::fmt::{self, Display, Formatter};

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Prefix of a direct magnet-style locator typed by a user.
const DIRECT_LOCATOR_PATTERN: &str = r"^magnet:\?xt=urn:[a-z0-9]+:[a-z0-9]{32,40}";

static DIRECT_LOCATOR: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| {
    RegexBuilder::new(DIRECT_LOCATOR_PATTERN)
        .case_insensitive(true)
        .build()
});

fn direct_locator_regex() -> CoreResult<&'static Regex> {
    DIRECT_LOCATOR
        .as_ref()
        .map_err(|source| CoreError::PatternCompile {
            pattern: "direct_locator",
            source: source.clone(),
        })
}

/// Where a worker should fetch its payload from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "uri", rename_all = "snake_case")]
pub enum ContentLocator {
    /// Content-addressed peer-to-peer locator.
    Magnet(String),
    /// Direct URL (metainfo file or raw payload).
    Url(String),
}

impl ContentLocator {
    /// Recognise a locator pasted directly by a user.
    ///
    /// Returns `Ok(None)` when the text is not a magnet-style locator.
    ///
    /// # Errors
    ///
    /// Returns an error only if the built-in pattern fails to compile.
    pub fn parse_direct(text: &str) -> CoreResult<Option<Self>> {
        let trimmed = text.trim();
        if direct_locator_regex()?.is_match(trimmed) {
            Ok(Some(Self::Magnet(trimmed.to_string())))
        } else {
            Ok(None)
        }
    }

    /// Classify a locator produced by a search provider.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidLocator`] when the value is neither a
    /// magnet URI nor an HTTP(S) URL.
    pub fn from_resolved(value: &str) -> CoreResult<Self> {
        let trimmed = value.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("magnet:?") {
            Ok(Self::Magnet(trimmed.to_string()))
        } else if lower.starts_with("http://") || lower.starts_with("https://") {
            Ok(Self::Url(trimmed.to_string()))
        } else {
            Err(CoreError::InvalidLocator {
                reason: "unsupported scheme",
                value: trimmed.to_string(),
            })
        }
    }

    /// Raw locator string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Magnet(uri) | Self::Url(uri) => uri,
        }
    }
}

impl Display for ContentLocator {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn direct_locator_accepts_magnets_case_insensitively() -> CoreResult<()> {
        let text = format!("  MAGNET:?xt=urn:btih:{HASH}&dn=movie ");
        let parsed = ContentLocator::parse_direct(&text)?;
        assert_eq!(
            parsed,
            Some(ContentLocator::Magnet(format!(
                "MAGNET:?xt=urn:btih:{HASH}&dn=movie"
            )))
        );
        Ok(())
    }

    #[test]
    fn direct_locator_rejects_free_text_and_short_hashes() -> CoreResult<()> {
        assert_eq!(ContentLocator::parse_direct("Interstellar 2014")?, None);
        assert_eq!(
            ContentLocator::parse_direct("magnet:?xt=urn:btih:abc123")?,
            None
        );
        Ok(())
    }

    #[test]
    fn resolved_locators_are_classified_by_scheme() {
        assert!(matches!(
            ContentLocator::from_resolved(&format!("magnet:?xt=urn:btih:{HASH}")),
            Ok(ContentLocator::Magnet(_))
        ));
        assert!(matches!(
            ContentLocator::from_resolved("https://indexer.example/dl/1.torrent"),
            Ok(ContentLocator::Url(_))
        ));
        assert!(matches!(
            ContentLocator::from_resolved("ftp://indexer.example/1"),
            Err(CoreError::InvalidLocator { reason: "unsupported scheme", .. })
        ));
    }
}
