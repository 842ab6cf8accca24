// Content-type detection from file bytes

use std::path::Path;

const SNIFF_LEN: usize = 512;

/// Magic-byte signatures checked against the start of the content.
const SIGNATURES: &[(&[u8], &str)] = &[
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"BM", "image/bmp"),
    (b"\x00\x00\x01\x00", "image/x-icon"),
    (b"%PDF-", "application/pdf"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1F\x8B\x08", "application/x-gzip"),
    (b"\x00asm", "application/wasm"),
    (b"wOFF", "font/woff"),
    (b"wOF2", "font/woff2"),
    (b"OggS\x00", "application/ogg"),
    (b"ID3", "audio/mpeg"),
];

/// Markup prefixes matched case-insensitively after leading whitespace.
const MARKUP: &[(&[u8], &str)] = &[
    (b"<!doctype html", "text/html; charset=utf-8"),
    (b"<html", "text/html; charset=utf-8"),
    (b"<head", "text/html; charset=utf-8"),
    (b"<body", "text/html; charset=utf-8"),
    (b"<?xml", "text/xml; charset=utf-8"),
];

fn is_binary_control(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

fn looks_like_text(head: &[u8]) -> bool {
    if head.iter().any(|&b| is_binary_control(b)) {
        return false;
    }
    // A multi-byte character may be cut at the sniff boundary.
    match std::str::from_utf8(head) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    }
}

/// Detect a content type for `content`, using `path` only when the bytes
/// alone are inconclusive.
///
/// Order: binary signatures, markup prefixes, the file extension, then
/// plain text versus `application/octet-stream`.
pub fn sniff_content_type(content: &[u8], path: &Path) -> String {
    let head = &content[..content.len().min(SNIFF_LEN)];

    if head.len() >= 12 && &head[..4] == b"RIFF" && &head[8..12] == b"WEBP" {
        return "image/webp".to_string();
    }
    if let Some((_, mime)) = SIGNATURES.iter().find(|(sig, _)| head.starts_with(sig)) {
        return mime.to_string();
    }

    let trimmed = head
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map(|start| &head[start..])
        .unwrap_or(&[]);
    if let Some((_, mime)) = MARKUP.iter().find(|(prefix, _)| {
        trimmed.len() >= prefix.len() && trimmed[..prefix.len()].eq_ignore_ascii_case(prefix)
    }) {
        return mime.to_string();
    }

    if let Some(guess) = mime_guess::from_path(path).first() {
        return if guess.type_() == mime::TEXT {
            format!("{}; charset=utf-8", guess.essence_str())
        } else {
            guess.essence_str().to_string()
        };
    }

    if looks_like_text(head) {
        mime::TEXT_PLAIN_UTF_8.to_string()
    } else {
        mime::APPLICATION_OCTET_STREAM.to_string()
    }
}
