#![forbid(unsafe_code)]

//! Server-side HTML for the trending list and the video detail page.
//!
//! Every value that came from YouTube goes through [`escape`] before it is
//! written into markup. Missing fields render as empty strings.

use std::fmt::Write;

use chrono::DateTime;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::store::{Count, Thumbnail, TrendingEntry, VideoRecord};

const STYLESHEET: &str = "/assets/style.css";

// Everything but RFC 3986 unreserved characters.
const URL_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub fn render_trending(entries: &[TrendingEntry]) -> String {
    let mut body = String::new();
    body.push_str("<header><h1>Trending</h1></header>\n<main class=\"grid\">\n");

    if entries.is_empty() {
        body.push_str("<p class=\"empty\">No trending videos yet.</p>\n");
    }

    for entry in entries {
        let href = format!("/video/{}", url_component(&entry.id));
        let _ = write!(
            body,
            concat!(
                "<article class=\"video-card\">\n",
                "<a href=\"{href}\" class=\"thumb\">{thumb}<span class=\"duration\">{duration}</span></a>\n",
                "<h2><a href=\"{href}\">{title}</a></h2>\n",
                "<p class=\"author\">{author}</p>\n",
                "<p class=\"views\">{views}</p>\n",
                "</article>\n",
            ),
            href = href,
            thumb = thumbnail_tag(entry.thumbnail.as_ref(), entry.title.as_deref()),
            duration = escape(&display_duration(entry.time_text.as_deref())),
            title = escape(entry.title.as_deref().unwrap_or_default()),
            author = escape(entry.author.as_deref().unwrap_or_default()),
            views = escape(&display_views(entry.view_count.as_ref())),
        );
    }

    body.push_str("</main>\n");
    layout("Trending videos", &body)
}

pub fn render_video(record: &VideoRecord) -> String {
    let title = record.title.as_deref().unwrap_or_default();
    let watch_url = format!(
        "https://www.youtube.com/watch?v={}",
        url_component(&record.id)
    );
    // Prefer the high variant, fall back to whatever exists.
    let poster = record
        .video_thumbnails
        .get(2)
        .or_else(|| record.video_thumbnails.last());

    let mut body = String::new();
    body.push_str("<header><a href=\"/\">&larr; Trending</a></header>\n<main class=\"detail\">\n");
    let _ = write!(
        body,
        concat!(
            "<a href=\"{watch}\" class=\"poster\">{poster}</a>\n",
            "<h1>{title}</h1>\n",
            "<p class=\"meta\"><span class=\"author\">{author}</span>",
            " &middot; <span class=\"published\">{published}</span></p>\n",
            "<p class=\"stats\"><span class=\"views\">{views}</span>",
            " &middot; <span class=\"likes\">{likes}</span>",
            " &middot; <span class=\"duration\">{duration}</span></p>\n",
            "<div class=\"description\">{description}</div>\n",
            "<p><a href=\"{watch}\">Watch on YouTube</a></p>\n",
        ),
        watch = watch_url,
        poster = thumbnail_tag(poster, Some(title)),
        title = escape(title),
        author = escape(record.author.as_deref().unwrap_or_default()),
        published = escape(&display_published(record.published.as_deref())),
        views = escape(&display_views(record.view_count.as_ref())),
        likes = escape(&display_likes(record.like_count.as_ref())),
        duration = escape(&display_duration(record.time_text.as_deref())),
        description = escape(record.description.as_deref().unwrap_or_default())
            .replace('\n', "<br>\n"),
    );
    body.push_str("</main>\n");

    layout(title, &body)
}

fn layout(title: &str, body: &str) -> String {
    format!(
        concat!(
            "<!DOCTYPE html>\n",
            "<html lang=\"en\">\n",
            "<head>\n",
            "<meta charset=\"utf-8\">\n",
            "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n",
            "<title>{title}</title>\n",
            "<link rel=\"stylesheet\" href=\"{css}\">\n",
            "</head>\n",
            "<body>\n{body}</body>\n",
            "</html>\n",
        ),
        title = escape(title),
        css = STYLESHEET,
        body = body,
    )
}

fn thumbnail_tag(thumbnail: Option<&Thumbnail>, alt: Option<&str>) -> String {
    let Some(url) = thumbnail.and_then(|thumb| thumb.url.as_deref()) else {
        return String::from("<span class=\"no-thumb\"></span>");
    };
    let mut tag = format!(
        "<img src=\"{}\" alt=\"{}\" loading=\"lazy\"",
        escape(url),
        escape(alt.unwrap_or_default())
    );
    if let Some(thumb) = thumbnail {
        if let Some(width) = thumb.width {
            let _ = write!(tag, " width=\"{width}\"");
        }
        if let Some(height) = thumb.height {
            let _ = write!(tag, " height=\"{height}\"");
        }
    }
    tag.push('>');
    tag
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Percent-encodes an id for use in a path segment or query value. The
/// output is plain ASCII and needs no further HTML escaping.
pub fn url_component(text: &str) -> String {
    utf8_percent_encode(text, URL_COMPONENT).to_string()
}

fn display_views(count: Option<&Count>) -> String {
    count
        .map(|count| format!("{} views", group_digits(count)))
        .unwrap_or_default()
}

fn display_likes(count: Option<&Count>) -> String {
    count
        .map(|count| format!("{} likes", group_digits(count)))
        .unwrap_or_default()
}

/// `1234567` → `1,234,567`. Counters that are not plain digits are shown as is.
pub fn group_digits(count: &Count) -> String {
    let raw = count.to_string();
    if raw.is_empty() || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return raw;
    }
    let mut grouped = String::with_capacity(raw.len() + raw.len() / 3);
    for (position, ch) in raw.chars().enumerate() {
        if position > 0 && (raw.len() - position) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

fn display_duration(raw: Option<&str>) -> String {
    match raw {
        Some(raw) => format_duration(raw).unwrap_or_else(|| raw.to_string()),
        None => String::new(),
    }
}

fn display_published(raw: Option<&str>) -> String {
    match raw {
        Some(raw) => DateTime::parse_from_rfc3339(raw.trim())
            .map(|parsed| parsed.format("%b %-d, %Y").to_string())
            .unwrap_or_else(|_| raw.to_string()),
        None => String::new(),
    }
}

/// Turns an ISO-8601 duration such as `PT1H2M3S` into `1:02:03`.
pub fn format_duration(raw: &str) -> Option<String> {
    let rest = raw.trim().strip_prefix('P')?;
    let (date_part, time_part) = rest.split_once('T').unwrap_or((rest, ""));
    if date_part.is_empty() && time_part.is_empty() {
        return None;
    }

    const DATE_UNITS: &[(char, u64)] = &[('W', 604_800), ('D', 86_400)];
    const TIME_UNITS: &[(char, u64)] = &[('H', 3_600), ('M', 60), ('S', 1)];

    let mut total: u64 = 0;
    for (part, units) in [(date_part, DATE_UNITS), (time_part, TIME_UNITS)] {
        let mut digits = String::new();
        for ch in part.chars() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                continue;
            }
            let (_, scale) = units.iter().find(|(unit, _)| *unit == ch)?;
            let value: u64 = digits.parse().ok()?;
            total = total.checked_add(value.checked_mul(*scale)?)?;
            digits.clear();
        }
        if !digits.is_empty() {
            return None;
        }
    }

    let hours = total / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    Some(if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    })
}
