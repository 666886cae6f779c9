//! Content-type inference for uploads.
//!
//! The extension table is consulted first. Keys without a known extension
//! fall back to sniffing the first [`SNIFF_LEN`] bytes of the content; the
//! sniffed bytes are chained back in front of the stream so the upload sees
//! every byte.

use std::io::Cursor;

use tokio::io::{AsyncRead, AsyncReadExt, Chain};

/// Number of leading bytes inspected when sniffing.
pub const SNIFF_LEN: usize = 512;

/// Fallback for binary content nothing else matched.
pub const OCTET_STREAM: &str = "application/octet-stream";

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const TEXT_HTML: &str = "text/html; charset=utf-8";

/// Byte-pattern signature. Bytes where `mask` is zero are ignored.
struct Magic {
    pattern: &'static [u8],
    mask: Option<&'static [u8]>,
    mime: &'static str,
}

impl Magic {
    const fn exact(pattern: &'static [u8], mime: &'static str) -> Self {
        Self {
            pattern,
            mask: None,
            mime,
        }
    }

    const fn masked(pattern: &'static [u8], mask: &'static [u8], mime: &'static str) -> Self {
        Self {
            pattern,
            mask: Some(mask),
            mime,
        }
    }

    fn matches(&self, data: &[u8]) -> bool {
        if data.len() < self.pattern.len() {
            return false;
        }
        match self.mask {
            None => data.starts_with(self.pattern),
            Some(mask) => self
                .pattern
                .iter()
                .zip(mask)
                .zip(data)
                .all(|((p, m), d)| d & m == *p),
        }
    }
}

const SIGNATURES: &[Magic] = &[
    Magic::exact(b"%PDF-", "application/pdf"),
    Magic::exact(b"%!PS-Adobe-", "application/postscript"),
    Magic::exact(b"\xFE\xFF", "text/plain; charset=utf-16be"),
    Magic::exact(b"\xFF\xFE", "text/plain; charset=utf-16le"),
    Magic::exact(b"\xEF\xBB\xBF", TEXT_PLAIN),
    Magic::exact(b"\x00\x00\x01\x00", "image/x-icon"),
    Magic::exact(b"\x00\x00\x02\x00", "image/x-icon"),
    Magic::exact(b"BM", "image/bmp"),
    Magic::exact(b"GIF87a", "image/gif"),
    Magic::exact(b"GIF89a", "image/gif"),
    Magic::masked(
        b"RIFF\x00\x00\x00\x00WEBPVP",
        b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF\xFF\xFF",
        "image/webp",
    ),
    Magic::exact(b"\x89PNG\x0D\x0A\x1A\x0A", "image/png"),
    Magic::exact(b"\xFF\xD8\xFF", "image/jpeg"),
    Magic::masked(
        b"RIFF\x00\x00\x00\x00WAVE",
        b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        "audio/wave",
    ),
    Magic::exact(b"ID3", "audio/mpeg"),
    Magic::exact(b"OggS\x00", "application/ogg"),
    Magic::exact(b"\x1A\x45\xDF\xA3", "video/webm"),
    Magic::exact(b"\x00\x61\x73\x6D", "application/wasm"),
    Magic::exact(b"\x1F\x8B\x08", "application/x-gzip"),
    Magic::exact(b"PK\x03\x04", "application/zip"),
    Magic::exact(b"Rar!\x1A\x07\x00", "application/x-rar-compressed"),
    Magic::exact(b"Rar!\x1A\x07\x01\x00", "application/x-rar-compressed"),
];

const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

/// Content type from the key's extension, if the extension is known.
#[must_use]
pub fn from_extension(key: &str) -> Option<String> {
    mime_guess::from_path(key).first_raw().map(str::to_string)
}

/// Detect a content type from leading bytes.
///
/// Always returns something: `text/plain` for content without binary
/// control bytes, `application/octet-stream` otherwise.
#[must_use]
pub fn sniff(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];

    let trimmed = trim_leading_whitespace(data);
    if HTML_TAGS.iter().any(|tag| html_tag_matches(trimmed, tag)) {
        return TEXT_HTML;
    }
    if trimmed.starts_with(b"<?xml") {
        return "text/xml; charset=utf-8";
    }

    if let Some(magic) = SIGNATURES.iter().find(|m| m.matches(data)) {
        return magic.mime;
    }

    if data.iter().copied().any(is_binary_byte) {
        OCTET_STREAM
    } else {
        TEXT_PLAIN
    }
}

/// Resolve the content type for an upload to `key`.
///
/// Returns the type and a reader yielding the complete original stream.
pub async fn detect<R>(
    key: &str,
    mut content: R,
) -> std::io::Result<(String, Chain<Cursor<Vec<u8>>, R>)>
where
    R: AsyncRead + Unpin,
{
    if let Some(mime) = from_extension(key) {
        return Ok((mime, Cursor::new(Vec::new()).chain(content)));
    }

    let mut head = Vec::with_capacity(SNIFF_LEN);
    (&mut content)
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head)
        .await?;
    let mime = sniff(&head).to_string();
    Ok((mime, Cursor::new(head).chain(content)))
}

fn trim_leading_whitespace(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !matches!(b, b'\t' | b'\n' | b'\x0C' | b'\r' | b' '))
        .unwrap_or(data.len());
    &data[start..]
}

fn html_tag_matches(data: &[u8], tag: &[u8]) -> bool {
    if data.len() <= tag.len() {
        return false;
    }
    let prefix_matches = data
        .iter()
        .zip(tag)
        .all(|(d, t)| d.to_ascii_uppercase() == *t);
    prefix_matches && matches!(data[tag.len()], b' ' | b'>')
}

fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}
