//! Link (virtual object) domain model.
//!
//! A link is a positioned reference embedded in one record that points at
//! another real object's record. It carries its own display metadata,
//! independent of the target's.
//!
//! # Invariants
//! - `rect.right > rect.left` and `rect.bottom > rect.top`.
//! - Colors are always representable as `#rrggbb`.

use crate::model::real_object::{RealId, RecordNo};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Target of a link: one record of one real object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkTarget {
    pub real_id: RealId,
    pub record_no: RecordNo,
}

impl LinkTarget {
    pub fn new(real_id: RealId, record_no: RecordNo) -> Self {
        Self { real_id, record_no }
    }

    /// Composite `{realId}_{recordNo}` token used in the `id` attribute.
    pub fn token(&self) -> String {
        format!("{}_{}", self.real_id, self.record_no)
    }
}

impl Display for LinkTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.real_id, self.record_no)
    }
}

/// Placement of a link inside the containing record, in record units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl LinkRect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_valid(&self) -> bool {
        self.right > self.left && self.bottom > self.top
    }
}

impl Default for LinkRect {
    fn default() -> Self {
        Self::new(0, 0, 150, 31)
    }
}

/// 24-bit RGB color serialized as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0x00, 0x00, 0x00);
    pub const WHITE: Color = Color::rgb(0xff, 0xff, 0xff);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#rrggbb` (case-insensitive). Other notations are rejected.
    pub fn parse_hex(value: &str) -> Option<Self> {
        let digits = value.trim().strip_prefix('#')?;
        if digits.len() != 6 || !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
        Some(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Colors and sizes used when presenting a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStyle {
    /// `frcol`
    pub frame_color: Color,
    /// `chcol`
    pub char_color: Color,
    /// `tbcol`
    pub title_bar_color: Color,
    /// `bgcol`
    pub background_color: Color,
    /// `chsz`, character size in points.
    pub font_size: u32,
    /// `height`, opened-window height; 0 means "use the rect height".
    pub height: u32,
    /// `dlen`, displayed name length; 0 means "full name".
    pub display_length: u32,
}

impl Default for LinkStyle {
    fn default() -> Self {
        Self {
            frame_color: Color::BLACK,
            char_color: Color::BLACK,
            title_bar_color: Color::WHITE,
            background_color: Color::WHITE,
            font_size: 14,
            height: 0,
            display_length: 0,
        }
    }
}

/// Boolean display toggles of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkFlags {
    pub show_icon: bool,
    pub show_name: bool,
    pub show_role: bool,
    pub show_type: bool,
    pub show_update_time: bool,
    pub show_frame: bool,
    pub auto_open: bool,
}

impl Default for LinkFlags {
    fn default() -> Self {
        Self {
            show_icon: true,
            show_name: true,
            show_role: false,
            show_type: false,
            show_update_time: false,
            show_frame: true,
            auto_open: false,
        }
    }
}

/// Embedded reference ("virtual object") from a record to a target record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub target: LinkTarget,
    pub display_name: String,
    pub rect: LinkRect,
    pub style: LinkStyle,
    pub flags: LinkFlags,
}

/// Invalid link contents, raised by the codec and by link writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// `id` attribute is absent.
    MissingTarget,
    /// Opening tag has no matching `</link>` before the next link element.
    Unterminated,
    /// `id` attribute is neither a composite token nor a bare identifier.
    InvalidTarget(String),
    /// Attribute value cannot be decoded into its declared type.
    InvalidAttribute { name: &'static str, value: String },
    /// Geometry violates `right > left` / `bottom > top`.
    InvalidGeometry(LinkRect),
}

impl Display for LinkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingTarget => write!(f, "link has no `id` attribute"),
            Self::Unterminated => write!(f, "link element is not closed"),
            Self::InvalidTarget(token) => write!(f, "link target `{token}` is not resolvable"),
            Self::InvalidAttribute { name, value } => {
                write!(f, "link attribute `{name}` has invalid value `{value}`")
            }
            Self::InvalidGeometry(rect) => write!(
                f,
                "link geometry is degenerate: left={} top={} right={} bottom={}",
                rect.left, rect.top, rect.right, rect.bottom
            ),
        }
    }
}

impl Error for LinkError {}

impl Link {
    /// Creates a link with default geometry and display attributes.
    pub fn new(target: LinkTarget, display_name: impl Into<String>) -> Self {
        Self {
            target,
            display_name: display_name.into(),
            rect: LinkRect::default(),
            style: LinkStyle::default(),
            flags: LinkFlags::default(),
        }
    }

    /// Returns a copy of this link placed at `rect`.
    pub fn at(mut self, rect: LinkRect) -> Self {
        self.rect = rect;
        self
    }

    pub fn validate(&self) -> Result<(), LinkError> {
        if !self.rect.is_valid() {
            return Err(LinkError::InvalidGeometry(self.rect));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Color, Link, LinkError, LinkFlags, LinkRect, LinkTarget};
    use uuid::Uuid;

    #[test]
    fn color_hex_roundtrip_is_lowercase() {
        let color = Color::parse_hex("#A0b1C2").unwrap();
        assert_eq!(color, Color::rgb(0xa0, 0xb1, 0xc2));
        assert_eq!(color.to_hex(), "#a0b1c2");
    }

    #[test]
    fn color_rejects_short_and_named_forms() {
        assert!(Color::parse_hex("#fff").is_none());
        assert!(Color::parse_hex("red").is_none());
        assert!(Color::parse_hex("#gg0000").is_none());
    }

    #[test]
    fn default_flags_show_name_frame_and_icon_only() {
        let flags = LinkFlags::default();
        assert!(flags.show_name && flags.show_frame && flags.show_icon);
        assert!(!flags.show_role && !flags.show_type && !flags.show_update_time);
        assert!(!flags.auto_open);
    }

    #[test]
    fn validate_rejects_degenerate_rect() {
        let target = LinkTarget::new(Uuid::new_v4(), 0);
        let link = Link::new(target, "flat").at(LinkRect::new(10, 10, 10, 40));
        assert!(matches!(
            link.validate(),
            Err(LinkError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn target_token_joins_id_and_record_number() {
        let id = Uuid::new_v4();
        assert_eq!(LinkTarget::new(id, 3).token(), format!("{id}_3"));
    }
}
