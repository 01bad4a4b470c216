use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;
use std::path::Path;

use crate::config::ChannelConfig;
use crate::storage::ItemRecord;
use crate::util::atomic_write;

type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Renders cached records as an RSS 2.0 document.
///
/// Items are ordered newest first by publication date, falling back to the
/// time the item was first seen; ties are broken by guid so that unchanged
/// input renders identically. Empty fields are omitted. Descriptions are
/// emitted as CDATA so embedded HTML survives without entity escaping.
///
/// # Arguments
///
/// * `records` - Store contents, in any order
/// * `channel` - Fixed channel metadata
/// * `now` - Value of `lastBuildDate`
pub fn render_feed<'a, I>(records: I, channel: &ChannelConfig, now: DateTime<Utc>) -> Result<String>
where
    I: IntoIterator<Item = &'a ItemRecord>,
{
    let mut sorted: Vec<&ItemRecord> = records.into_iter().collect();
    sorted.sort_by(|a, b| {
        b.sort_key()
            .cmp(&a.sort_key())
            .then_with(|| a.guid.cmp(&b.guid))
    });

    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .context("Failed to write XML declaration")?;
    writer
        .write_event(Event::Text(BytesText::from_escaped("\n")))
        .context("Failed to write XML declaration")?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    writer
        .write_event(Event::Start(rss))
        .context("Failed to write rss element")?;
    writer
        .write_event(Event::Start(BytesStart::new("channel")))
        .context("Failed to write channel element")?;

    write_text_element(&mut writer, "title", &channel.title)?;
    write_text_element(&mut writer, "link", &channel.link)?;
    write_text_element(&mut writer, "description", &channel.description)?;
    write_text_element(&mut writer, "lastBuildDate", &now.to_rfc2822())?;

    for record in sorted {
        write_item(&mut writer, record)
            .with_context(|| format!("Failed to write item '{}'", record.guid))?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("channel")))
        .context("Failed to write channel end")?;
    writer
        .write_event(Event::End(BytesEnd::new("rss")))
        .context("Failed to write rss end")?;

    let result = writer.into_inner().into_inner();
    String::from_utf8(result).context("Generated feed contains invalid UTF-8")
}

/// Writes the rendered feed, atomically replacing any previous output.
pub fn write_feed(path: &Path, xml: &str) -> Result<()> {
    atomic_write(path, xml.as_bytes())
        .with_context(|| format!("Failed to write feed to '{}'", path.display()))
}

fn write_item(writer: &mut XmlWriter, record: &ItemRecord) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("item")))?;

    if !record.title.is_empty() {
        write_text_element(writer, "title", &record.title)?;
    }
    if !record.link.is_empty() {
        write_text_element(writer, "link", &record.link)?;
    }
    if !record.description.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("description")))?;
        for section in cdata_sections(&record.description) {
            writer.write_event(Event::CData(BytesCData::new(section)))?;
        }
        writer.write_event(Event::End(BytesEnd::new("description")))?;
    }
    if let Some(enclosure) = record.enclosure.as_ref().filter(|e| e.has_media()) {
        let mut element = BytesStart::new("enclosure");
        for (key, value) in [
            ("url", &enclosure.url),
            ("length", &enclosure.length),
            ("type", &enclosure.mime_type),
        ] {
            if !value.is_empty() {
                element.push_attribute((key, value.as_str()));
            }
        }
        writer.write_event(Event::Empty(element))?;
    }
    if !record.pub_date_raw.is_empty() {
        write_text_element(writer, "pubDate", &record.pub_date_raw)?;
    }
    write_text_element(writer, "guid", &record.guid)?;

    writer.write_event(Event::End(BytesEnd::new("item")))?;
    Ok(())
}

fn write_text_element(writer: &mut XmlWriter, name: &str, text: &str) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .with_context(|| format!("Failed to write {} element", name))?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .with_context(|| format!("Failed to write {} text", name))?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .with_context(|| format!("Failed to write {} end", name))?;
    Ok(())
}

/// Splits text into CDATA-safe pieces.
///
/// A CDATA section cannot contain `]]>`, so the sequence is split between two
/// adjacent sections (`]]` ends one, `>` starts the next). Readers concatenate
/// them back into the original text.
fn cdata_sections(text: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find("]]>") {
        sections.push(&rest[..pos + 2]);
        rest = &rest[pos + 2..];
    }
    sections.push(rest);
    sections
}
