//! Course metadata and per-article outcome types shared by the pipeline.

use std::fmt;
use std::str::FromStr;

/// A purchased course and its articles in download order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    /// Platform course identifier.
    pub id: u64,
    /// Display title, used (sanitized) as the output directory name.
    pub title: String,
    /// Video-only course rather than a text/article course.
    pub is_video: bool,
    /// Whether the session is entitled to this course.
    pub access: bool,
    /// Articles in display order.
    pub articles: Vec<Article>,
}

/// A single content unit within a course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    /// Identifier, unique within its course.
    pub id: u64,
    /// Display title, used (sanitized) as the artifact file stem.
    pub title: String,
    /// Section grouping for video courses.
    pub section_title: Option<String>,
}

impl Article {
    #[must_use]
    pub fn new(id: u64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            section_title: None,
        }
    }

    #[must_use]
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section_title = Some(section.into());
        self
    }
}

/// Article body fetched lazily, once per dispatch attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleContent {
    /// Raw HTML payload.
    pub html: String,
    /// Per-segment video descriptors exposed alongside the body.
    pub inline_videos: Vec<InlineVideo>,
}

/// One clip of an article's inline video list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineVideo {
    pub video_url: String,
    pub subtitle_url: Option<String>,
}

/// Which of the document snapshot and the text export are requested.
///
/// Stored as the bitmask users configure: bit 0 is the PDF snapshot, bit 1
/// the Markdown export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSelection(u8);

impl FormatSelection {
    pub const PDF: Self = Self(0b01);
    pub const MARKDOWN: Self = Self(0b10);
    pub const ALL: Self = Self(0b11);

    /// Builds a selection from a configured bitmask (1..=3).
    #[must_use]
    pub fn from_bits(bits: u8) -> Option<Self> {
        (1..=3).contains(&bits).then_some(Self(bits))
    }

    #[must_use]
    pub fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn wants_pdf(self) -> bool {
        self.0 & Self::PDF.0 != 0
    }

    #[must_use]
    pub fn wants_markdown(self) -> bool {
        self.0 & Self::MARKDOWN.0 != 0
    }
}

impl Default for FormatSelection {
    fn default() -> Self {
        Self::ALL
    }
}

/// Result of one successful dispatch attempt.
///
/// `skipped` is true only when every requested document/text format was
/// already on disk. Failures travel in the `Err` side of the dispatch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub skipped: bool,
}

impl DownloadOutcome {
    #[must_use]
    pub fn skipped() -> Self {
        Self { skipped: true }
    }

    #[must_use]
    pub fn written() -> Self {
        Self { skipped: false }
    }
}

/// How session authorization is scoped for metadata and video requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionScope {
    #[default]
    Standard,
    University,
    Enterprise,
}

impl SessionScope {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::University => "university",
            Self::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for SessionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "university" => Ok(Self::University),
            "enterprise" => Ok(Self::Enterprise),
            other => Err(format!(
                "unknown session scope '{other}': expected standard, university or enterprise"
            )),
        }
    }
}

/// Stream quality label requested for course videos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoQuality {
    Ld,
    #[default]
    Sd,
    Hd,
}

impl VideoQuality {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ld => "ld",
            Self::Sd => "sd",
            Self::Hd => "hd",
        }
    }
}

impl FromStr for VideoQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ld" => Ok(Self::Ld),
            "sd" => Ok(Self::Sd),
            "hd" => Ok(Self::Hd),
            other => Err(format!("unknown quality '{other}': expected ld, sd or hd")),
        }
    }
}

/// One playable rendition of a course video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoVariant {
    /// Quality label as reported by the platform (`ld`, `sd`, `hd`).
    pub quality: String,
    /// Playlist or direct file URL.
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_selection_bits() {
        assert!(FormatSelection::from_bits(0).is_none());
        assert!(FormatSelection::from_bits(4).is_none());

        let pdf = FormatSelection::from_bits(1).unwrap_or_default();
        assert!(pdf.wants_pdf());
        assert!(!pdf.wants_markdown());

        let md = FormatSelection::from_bits(2).unwrap_or_default();
        assert!(!md.wants_pdf());
        assert!(md.wants_markdown());

        let both = FormatSelection::default();
        assert_eq!(both.bits(), 3);
        assert!(both.wants_pdf() && both.wants_markdown());
    }

    #[test]
    fn test_session_scope_parse() {
        assert_eq!("University".parse(), Ok(SessionScope::University));
        assert_eq!(" enterprise ".parse(), Ok(SessionScope::Enterprise));
        assert!("campus".parse::<SessionScope>().is_err());
    }

    #[test]
    fn test_video_quality_parse() {
        assert_eq!("HD".parse(), Ok(VideoQuality::Hd));
        assert_eq!(VideoQuality::default().as_str(), "sd");
        assert!("4k".parse::<VideoQuality>().is_err());
    }
}
