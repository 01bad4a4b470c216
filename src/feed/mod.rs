//! Feed handling for the mirror: fetching, parsing, item extraction, preview
//! images and rendering.
//!
//! - [`fetcher`] - HTTP retrieval with timeouts and a body size cap
//! - [`parser`] - XML to element tree, RSS `item`s or Atom `entry`s
//! - [`extract`] - Element to [`ParsedItem`](crate::storage::ParsedItem), guid normalization
//! - [`preview`] - `og:image` lookup on the item's article page
//! - [`render`] - RSS 2.0 output with CDATA descriptions
//!
//! # Example
//!
//! ```ignore
//! let bytes = fetch_feed(&client, url, &config.http).await?;
//! for raw in parse_items(&bytes)? {
//!     let item = apply_preview(extract_item(&raw), &resolver).await;
//! }
//! ```

mod extract;
mod fetcher;
mod parser;
mod preview;
mod render;

pub use extract::{apply_preview, extract_item, normalize_guid};
pub use fetcher::{build_client, fetch_feed, FetchError};
pub use parser::{parse_document, parse_items, ParseError, XmlElement, ATOM_NS};
pub use preview::{find_og_image, infer_image_type, OgImage, PreviewResolver};
pub use render::{render_feed, write_feed};
