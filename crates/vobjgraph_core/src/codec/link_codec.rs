//! Link element codec.
//!
//! Records are markup documents. A link is embedded as
//! `<link id="{realId}_{recordNo}" vobjleft=".." ...>display name</link>`;
//! everything outside link elements is opaque and preserved byte-for-byte.
//!
//! # Invariants
//! - One malformed element never aborts parsing of the rest of a record.
//! - Attributes absent from an element fall back to `Link` defaults.
//! - Malformed elements are left untouched by `serialize_links`.

use crate::model::link::{Color, Link, LinkError, LinkFlags, LinkRect, LinkStyle, LinkTarget};
use crate::model::real_object::{RealId, Record};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::ops::Range;
use uuid::Uuid;

static LINK_OPEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<link\b").expect("valid link open regex"));
static LINK_CLOSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</link\s*>").expect("valid link close regex"));
static ATTRIBUTE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_][\w\-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("valid attribute regex")
});

const DOCUMENT_CLOSE_TAG: &str = "</document>";

/// One link element located in record content.
#[derive(Debug, Clone)]
struct LinkSpan {
    range: Range<usize>,
    parsed: Result<Link, LinkError>,
}

/// Extracts every well-formed link from a record.
///
/// Malformed elements are logged and skipped.
pub fn parse_links(record: &Record) -> Vec<Link> {
    scan_links(&record.content)
        .into_iter()
        .filter_map(|span| match span.parsed {
            Ok(link) => Some(link),
            Err(err) => {
                warn!(
                    "event=link_parse module=codec status=skip error_code=malformed_link offset={} error={}",
                    span.range.start, err
                );
                None
            }
        })
        .collect()
}

/// Re-embeds `links` into `record`, returning the rewritten record.
///
/// Well-formed link elements are replaced in document order. Surplus
/// elements are removed, extra links are appended after the last existing
/// link element, or before `</document>`, or at the end of the content.
pub fn serialize_links(record: &Record, links: &[Link]) -> Record {
    let content = record.content.as_str();
    let spans = scan_links(content);

    let mut output = String::with_capacity(content.len() + links.len() * 256);
    let mut cursor = 0usize;
    let mut remaining = links.iter();

    for span in &spans {
        output.push_str(&content[cursor..span.range.start]);
        if span.parsed.is_ok() {
            if let Some(link) = remaining.next() {
                output.push_str(&encode_link(link));
            }
        } else {
            output.push_str(&content[span.range.clone()]);
        }
        cursor = span.range.end;
    }

    let extra = remaining.map(encode_link).collect::<Vec<_>>();
    if extra.is_empty() {
        output.push_str(&content[cursor..]);
        return Record::new(output);
    }

    let appended = extra.join("\n");
    if !spans.is_empty() {
        output.push('\n');
        output.push_str(&appended);
        output.push_str(&content[cursor..]);
    } else if let Some(close_at) = content.rfind(DOCUMENT_CLOSE_TAG) {
        output.push_str(&content[..close_at]);
        output.push_str(&appended);
        output.push('\n');
        output.push_str(&content[close_at..]);
    } else {
        output.push_str(content);
        output.push_str(&appended);
    }
    Record::new(output)
}

/// Resolves a link token to the target's real id.
///
/// Accepts `{realId}_{recordNo}` or a bare identifier; anything else maps
/// to `None`.
pub fn resolve_target_id(token: &str) -> Option<RealId> {
    parse_link_target(token).map(|target| target.real_id)
}

/// Resolves a link token keeping its record number (0 for bare ids).
pub fn parse_link_target(token: &str) -> Option<LinkTarget> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    match token.rsplit_once('_') {
        Some((id_part, record_part)) => {
            if record_part.is_empty() || !record_part.chars().all(|ch| ch.is_ascii_digit()) {
                return None;
            }
            let real_id = Uuid::parse_str(id_part).ok()?;
            let record_no = record_part.parse().ok()?;
            Some(LinkTarget::new(real_id, record_no))
        }
        None => Uuid::parse_str(token)
            .ok()
            .map(|real_id| LinkTarget::new(real_id, 0)),
    }
}

/// Encodes one link as a markup element.
pub fn encode_link(link: &Link) -> String {
    let LinkRect {
        left,
        top,
        right,
        bottom,
    } = link.rect;
    let style = &link.style;
    let flags = &link.flags;
    format!(
        "<link id=\"{}\" vobjleft=\"{left}\" vobjtop=\"{top}\" vobjright=\"{right}\" vobjbottom=\"{bottom}\" \
height=\"{}\" chsz=\"{}\" frcol=\"{}\" chcol=\"{}\" tbcol=\"{}\" bgcol=\"{}\" dlen=\"{}\" \
pictdisp=\"{}\" namedisp=\"{}\" roledisp=\"{}\" typedisp=\"{}\" updatedisp=\"{}\" framedisp=\"{}\" autoopen=\"{}\">{}</link>",
        escape_markup(&link.target.token()),
        style.height,
        style.font_size,
        style.frame_color,
        style.char_color,
        style.title_bar_color,
        style.background_color,
        style.display_length,
        flags.show_icon,
        flags.show_name,
        flags.show_role,
        flags.show_type,
        flags.show_update_time,
        flags.show_frame,
        flags.auto_open,
        escape_markup(&link.display_name),
    )
}

/// Removes the `index`-th well-formed link element from a record.
///
/// Returns the removed link together with the rewritten record, or `None`
/// when the record has fewer links.
pub fn remove_link_at(record: &Record, index: usize) -> Option<(Link, Record)> {
    let mut links = parse_links(record);
    if index >= links.len() {
        return None;
    }
    let removed = links.remove(index);
    Some((removed, serialize_links(record, &links)))
}

/// Splits content into link element spans.
///
/// An element's body never extends past the next `<link`; an opening tag
/// without its own close tag becomes a malformed span covering only the
/// tag, so the content after it stays plain text.
fn scan_links(content: &str) -> Vec<LinkSpan> {
    let starts = LINK_OPEN_RE
        .find_iter(content)
        .map(|m| m.start())
        .collect::<Vec<_>>();
    let mut spans = Vec::with_capacity(starts.len());

    for (index, &start) in starts.iter().enumerate() {
        let limit = starts.get(index + 1).copied().unwrap_or(content.len());
        let attributes_start = start + "<link".len();
        let Some(tag_end) = content[attributes_start..limit]
            .find('>')
            .map(|offset| attributes_start + offset)
        else {
            spans.push(LinkSpan {
                range: start..limit,
                parsed: Err(LinkError::Unterminated),
            });
            continue;
        };

        let attributes = &content[attributes_start..tag_end];
        if let Some(attributes) = attributes.strip_suffix('/') {
            spans.push(LinkSpan {
                range: start..tag_end + 1,
                parsed: decode_link(attributes, ""),
            });
            continue;
        }

        let body_start = tag_end + 1;
        match LINK_CLOSE_RE.find(&content[body_start..limit]) {
            Some(close) => spans.push(LinkSpan {
                range: start..body_start + close.end(),
                parsed: decode_link(attributes, &content[body_start..body_start + close.start()]),
            }),
            None => spans.push(LinkSpan {
                range: start..body_start,
                parsed: Err(LinkError::Unterminated),
            }),
        }
    }
    spans
}

fn decode_link(attributes: &str, text: &str) -> Result<Link, LinkError> {
    let attrs = ATTRIBUTE_RE
        .captures_iter(attributes)
        .filter_map(|captures| {
            let name = captures.get(1)?.as_str().to_ascii_lowercase();
            let value = captures
                .get(2)
                .or_else(|| captures.get(3))
                .map_or(String::new(), |m| unescape_markup(m.as_str()));
            Some((name, value))
        })
        .collect::<HashMap<_, _>>();

    let token = attrs.get("id").ok_or(LinkError::MissingTarget)?;
    let target =
        parse_link_target(token).ok_or_else(|| LinkError::InvalidTarget(token.clone()))?;

    let defaults_rect = LinkRect::default();
    let rect = LinkRect::new(
        int_attr(&attrs, "vobjleft", defaults_rect.left)?,
        int_attr(&attrs, "vobjtop", defaults_rect.top)?,
        int_attr(&attrs, "vobjright", defaults_rect.right)?,
        int_attr(&attrs, "vobjbottom", defaults_rect.bottom)?,
    );

    let defaults_style = LinkStyle::default();
    let style = LinkStyle {
        frame_color: color_attr(&attrs, "frcol", defaults_style.frame_color)?,
        char_color: color_attr(&attrs, "chcol", defaults_style.char_color)?,
        title_bar_color: color_attr(&attrs, "tbcol", defaults_style.title_bar_color)?,
        background_color: color_attr(&attrs, "bgcol", defaults_style.background_color)?,
        font_size: int_attr(&attrs, "chsz", defaults_style.font_size)?,
        height: int_attr(&attrs, "height", defaults_style.height)?,
        display_length: int_attr(&attrs, "dlen", defaults_style.display_length)?,
    };

    let defaults_flags = LinkFlags::default();
    let flags = LinkFlags {
        show_icon: bool_attr(&attrs, "pictdisp", defaults_flags.show_icon)?,
        show_name: bool_attr(&attrs, "namedisp", defaults_flags.show_name)?,
        show_role: bool_attr(&attrs, "roledisp", defaults_flags.show_role)?,
        show_type: bool_attr(&attrs, "typedisp", defaults_flags.show_type)?,
        show_update_time: bool_attr(&attrs, "updatedisp", defaults_flags.show_update_time)?,
        show_frame: bool_attr(&attrs, "framedisp", defaults_flags.show_frame)?,
        auto_open: bool_attr(&attrs, "autoopen", defaults_flags.auto_open)?,
    };

    let link = Link {
        target,
        display_name: unescape_markup(text.trim()),
        rect,
        style,
        flags,
    };
    link.validate()?;
    Ok(link)
}

fn int_attr<T: std::str::FromStr>(
    attrs: &HashMap<String, String>,
    name: &'static str,
    default: T,
) -> Result<T, LinkError> {
    match attrs.get(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| LinkError::InvalidAttribute {
            name,
            value: value.clone(),
        }),
    }
}

fn color_attr(
    attrs: &HashMap<String, String>,
    name: &'static str,
    default: Color,
) -> Result<Color, LinkError> {
    match attrs.get(name) {
        None => Ok(default),
        Some(value) => Color::parse_hex(value).ok_or_else(|| LinkError::InvalidAttribute {
            name,
            value: value.clone(),
        }),
    }
}

fn bool_attr(
    attrs: &HashMap<String, String>,
    name: &'static str,
    default: bool,
) -> Result<bool, LinkError> {
    match attrs.get(name).map(|value| value.trim()) {
        None => Ok(default),
        Some("true") => Ok(true),
        Some("false") => Ok(false),
        Some(other) => Err(LinkError::InvalidAttribute {
            name,
            value: other.to_string(),
        }),
    }
}

fn escape_markup(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn unescape_markup(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
