//! Markup codec for links embedded in record content.
//!
//! # Responsibility
//! - Extract link elements from record markup into typed `Link` values.
//! - Re-embed link lists without disturbing any non-link content.
//! - Resolve `id` tokens to real object identifiers.

pub mod link_codec;
