//! Detection of a directly downloadable video embedded in article HTML.

use scraper::{ElementRef, Html};

/// File suffix of a directly downloadable video source.
const DIRECT_VIDEO_SUFFIX: &str = ".mp4";

/// Returns the first `<source>` URL ending in `.mp4` nested under a `<video>`.
///
/// Sources outside a video element are ignored, and so are later qualifying
/// sources once one has been found.
///
/// # Examples
///
/// ```
/// use course_downloader::video::find_inline_video;
///
/// let html = r#"<video><source src="a.m3u8"><source src="https://cdn/b.mp4"></video>"#;
/// assert_eq!(find_inline_video(html).as_deref(), Some("https://cdn/b.mp4"));
/// ```
#[must_use]
pub fn find_inline_video(html: &str) -> Option<String> {
    if !html.contains("<video") || !html.contains("<source") {
        return None;
    }
    let document = Html::parse_fragment(html);
    first_video_source(document.root_element(), false)
}

fn first_video_source(element: ElementRef<'_>, inside_video: bool) -> Option<String> {
    let name = element.value().name();
    let inside_video = inside_video || name == "video";

    if inside_video
        && name == "source"
        && let Some(src) = element.value().attr("src")
        && is_direct_video(src)
    {
        return Some(src.trim().to_string());
    }

    element
        .children()
        .filter_map(ElementRef::wrap)
        .find_map(|child| first_video_source(child, inside_video))
}

fn is_direct_video(src: &str) -> bool {
    let path = src.trim().split(['?', '#']).next().unwrap_or_default();
    path.to_ascii_lowercase().ends_with(DIRECT_VIDEO_SUFFIX)
}
