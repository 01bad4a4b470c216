use super::fetcher::get_bytes;
use crate::config::HttpSettings;
use crate::storage::Enclosure;

/// `og:image` metadata scraped from an article page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OgImage {
    pub url: String,
    pub width: Option<String>,
    pub height: Option<String>,
}

/// Looks up the social preview image of an article page.
///
/// Holds the shared client and HTTP settings so the pipeline can resolve items
/// one after another without re-plumbing configuration.
#[derive(Debug, Clone)]
pub struct PreviewResolver {
    client: reqwest::Client,
    http: HttpSettings,
}

impl PreviewResolver {
    pub fn new(client: reqwest::Client, http: HttpSettings) -> Self {
        Self { client, http }
    }

    /// Fetches `page_url` and turns its `og:image` into an enclosure.
    ///
    /// Returns `None` on any failure: network error, timeout, non-2xx status,
    /// or a page without a usable `og:image`. Never fatal to the caller.
    pub async fn resolve(&self, page_url: &str) -> Option<Enclosure> {
        let bytes = match get_bytes(
            &self.client,
            page_url,
            &self.http,
            self.http.preview_timeout(),
        )
        .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(url = %page_url, error = %e, "Preview page fetch failed");
                return None;
            }
        };

        let html = String::from_utf8_lossy(&bytes);
        let Some(og) = find_og_image(&html) else {
            tracing::debug!(url = %page_url, "No og:image on page");
            return None;
        };

        let image_url = resolve_url(&og.url, page_url);
        tracing::debug!(
            page = %page_url,
            image = %image_url,
            width = og.width.as_deref().unwrap_or("-"),
            height = og.height.as_deref().unwrap_or("-"),
            "Resolved preview image"
        );

        Some(Enclosure {
            mime_type: infer_image_type(&image_url).to_string(),
            url: image_url,
            length: String::new(),
        })
    }
}

/// Guesses an image MIME type from the URL's file extension.
///
/// Query string and fragment are ignored; matching is case-insensitive.
/// Anything that is not `.webp` or `.png` is reported as JPEG.
pub fn infer_image_type(url: &str) -> &'static str {
    let lower = url.to_ascii_lowercase();
    let path = lower.split(|c: char| c == '?' || c == '#').next().unwrap_or_default();
    if path.ends_with(".webp") {
        "image/webp"
    } else if path.ends_with(".png") {
        "image/png"
    } else {
        "image/jpeg"
    }
}

/// Scans HTML `<meta>` tags for Open Graph image metadata.
///
/// Uses simple string scanning (no HTML parser dependency) so broken markup
/// elsewhere on the page does not matter. A tag's key is its `property`
/// attribute, or `name` when `property` is absent or blank. When a page
/// repeats a key the last occurrence wins.
///
/// Returns `None` when there is no `og:image` or its content is blank.
pub fn find_og_image(html: &str) -> Option<OgImage> {
    let html_lower = html.to_ascii_lowercase();
    let mut og = OgImage::default();
    let mut search_from = 0;

    while let Some(meta_start) = html_lower[search_from..].find("<meta") {
        let abs_start = search_from + meta_start;
        let tag_end = match find_tag_end(&html_lower, abs_start) {
            Some(pos) => pos,
            None => break,
        };
        search_from = tag_end + 1;

        // Reject e.g. <metadata>
        let after_name = html_lower.as_bytes().get(abs_start + 5).copied();
        if !matches!(after_name, Some(b) if b.is_ascii_whitespace() || b == b'/') {
            continue;
        }

        let attrs = parse_attributes(&html[abs_start + 5..tag_end]);
        let key = attr(&attrs, "property")
            .filter(|p| !p.trim().is_empty())
            .or_else(|| attr(&attrs, "name"))
            .map(|k| k.trim().to_ascii_lowercase());
        let content = attr(&attrs, "content").map(|c| c.trim().to_string());

        match key.as_deref() {
            Some("og:image") => og.url = content.unwrap_or_default(),
            Some("og:image:width") => og.width = content,
            Some("og:image:height") => og.height = content,
            _ => {}
        }
    }

    if og.url.is_empty() {
        None
    } else {
        Some(og)
    }
}

/// Index of the `>` closing the tag opened at `start`.
///
/// A `>` inside a quoted attribute value does not end the tag. An unterminated
/// quote falls back to the first `>`.
fn find_tag_end(html: &str, start: usize) -> Option<usize> {
    let mut quote = None;
    let mut prev = 0u8;
    for (i, b) in html.bytes().enumerate().skip(start) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'>' => return Some(i),
            None if matches!(b, b'"' | b'\'') && prev == b'=' => quote = Some(b),
            None => {}
        }
        if !b.is_ascii_whitespace() {
            prev = b;
        }
    }
    html[start..].find('>').map(|pos| start + pos)
}

fn attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

/// Splits the inside of a tag into lowercased names and unescaped values.
///
/// Handles double-quoted, single-quoted, unquoted and value-less attributes.
fn parse_attributes(tag_body: &str) -> Vec<(String, String)> {
    let bytes = tag_body.as_bytes();
    let mut attrs = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
            i += 1;
        }
        let name_start = i;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && !matches!(bytes[i], b'=' | b'/')
        {
            i += 1;
        }
        if name_start == i {
            break;
        }
        let name = tag_body[name_start..i].to_ascii_lowercase();

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'=' {
            attrs.push((name, String::new()));
            continue;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }

        let value = match bytes.get(i) {
            Some(&quote @ (b'"' | b'\'')) => {
                let value_start = i + 1;
                let value_end = tag_body[value_start..]
                    .find(quote as char)
                    .map_or(bytes.len(), |p| value_start + p);
                i = (value_end + 1).min(bytes.len());
                &tag_body[value_start..value_end]
            }
            _ => {
                let value_start = i;
                while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                &tag_body[value_start..i]
            }
        };
        attrs.push((name, unescape_attr(value)));
    }

    attrs
}

/// Decodes character references, leaving the value as-is if it holds an
/// entity XML does not know (`&nbsp;` and friends).
fn unescape_attr(value: &str) -> String {
    quick_xml::escape::unescape(value)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

/// Resolves a potentially relative URL against the page it was found on.
fn resolve_url(href: &str, base_url: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_owned();
    }
    url::Url::parse(base_url)
        .and_then(|base| base.join(href))
        .map(|resolved| resolved.to_string())
        .unwrap_or_else(|_| href.to_owned())
}
