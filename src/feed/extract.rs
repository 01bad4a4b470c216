use super::parser::{XmlElement, ATOM_NS};
use super::preview::PreviewResolver;
use crate::storage::{Enclosure, ParsedItem};
use crate::util::parse_pub_date;

const URN_UUID_PREFIX: &str = "urn:uuid:";

/// Maps one raw `<item>` (or Atom `<entry>`) into a [`ParsedItem`].
///
/// Pure: no network access. Missing children become empty strings. The
/// preview image lookup happens separately in [`apply_preview`].
pub fn extract_item(item: &XmlElement) -> ParsedItem {
    let title = first_non_empty(item, "title", &["title"]);
    let link = match child_text(item, "link") {
        link if link.is_empty() => atom_link(item).unwrap_or_default(),
        link => link,
    };

    let description = rss_child(item, "description")
        .or_else(|| atom_child(item, "summary"))
        .or_else(|| atom_child(item, "content"))
        .map(|d| d.text.clone())
        .unwrap_or_default();

    let enclosure = rss_child(item, "enclosure").map(|e| Enclosure {
        url: e.attr("url").unwrap_or_default().to_string(),
        length: e.attr("length").unwrap_or_default().to_string(),
        mime_type: e.attr("type").unwrap_or_default().to_string(),
    });

    let raw_guid = first_non_empty(item, "guid", &["id"]);
    let guid = normalize_guid(&raw_guid);

    let pub_date_raw = first_non_empty(item, "pubDate", &["published", "updated"]);
    let pub_date = parse_pub_date(&pub_date_raw);

    ParsedItem {
        guid,
        title,
        link,
        description,
        enclosure,
        pub_date_raw,
        pub_date,
    }
}

/// Replaces the item's enclosure with its page's `og:image`, when one exists.
///
/// The preview always wins over media supplied by the feed. When the lookup
/// yields nothing the native enclosure is kept.
pub async fn apply_preview(mut item: ParsedItem, resolver: &PreviewResolver) -> ParsedItem {
    if item.link.is_empty() {
        return item;
    }
    if let Some(preview) = resolver.resolve(&item.link).await {
        if item.enclosure.is_some() {
            tracing::debug!(guid = %item.guid, "Replacing feed enclosure with og:image preview");
        }
        item.enclosure = Some(preview);
    }
    item
}

/// Reduces a feed guid to its stable trailing identifier.
///
/// - `urn:uuid:` prefix (any case) is stripped
/// - otherwise, anything up to the last `:` is dropped
/// - otherwise the value is returned unchanged
///
/// ```
/// use rss_mirror::feed::normalize_guid;
///
/// assert_eq!(normalize_guid("urn:uuid:ABCD-1234"), "ABCD-1234");
/// assert_eq!(normalize_guid("tag:example.com,2024:post/42"), "post/42");
/// assert_eq!(normalize_guid("plain-id"), "plain-id");
/// ```
pub fn normalize_guid(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let has_urn_prefix = raw
        .get(..URN_UUID_PREFIX.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(URN_UUID_PREFIX));
    if has_urn_prefix {
        return raw[URN_UUID_PREFIX.len()..].to_string();
    }
    match raw.rsplit_once(':') {
        Some((_, tail)) => tail.to_string(),
        None => raw.to_string(),
    }
}

/// Un-namespaced child, so `media:title` or `dc:date` never shadow RSS fields.
fn rss_child<'a>(item: &'a XmlElement, name: &'a str) -> Option<&'a XmlElement> {
    item.children_in(None, name).next()
}

fn child_text(item: &XmlElement, name: &str) -> String {
    rss_child(item, name)
        .map(|c| c.text.trim().to_string())
        .unwrap_or_default()
}

fn atom_child<'a>(item: &'a XmlElement, name: &'a str) -> Option<&'a XmlElement> {
    item.children_in(Some(ATOM_NS), name).next()
}

/// Text of the RSS child `name`, else of the first non-empty Atom fallback.
fn first_non_empty(item: &XmlElement, name: &str, atom_fallbacks: &[&str]) -> String {
    let text = child_text(item, name);
    if !text.is_empty() {
        return text;
    }
    atom_fallbacks
        .iter()
        .filter_map(|fallback| atom_child(item, fallback))
        .map(|c| c.text.trim().to_string())
        .find(|text| !text.is_empty())
        .unwrap_or_default()
}

/// `href` of an Atom `<link>`, preferring `rel="alternate"` or no `rel`.
fn atom_link(item: &XmlElement) -> Option<String> {
    let links: Vec<&XmlElement> = item
        .children_in(Some(ATOM_NS), "link")
        .filter(|c| c.attr("href").is_some())
        .collect();
    links
        .iter()
        .find(|l| matches!(l.attr("rel"), None | Some("alternate")))
        .or_else(|| links.first())
        .and_then(|l| l.attr("href"))
        .map(|href| href.trim().to_string())
}
