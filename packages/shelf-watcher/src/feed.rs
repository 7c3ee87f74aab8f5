//! Shelf feed client.
//!
//! Fetches the reading-list RSS feed and pulls out one `FeedItem` per
//! `<item>`. Feeds in the wild are often not well-formed XML, so parsing is
//! deliberately lenient: mismatched end tags are tolerated, unknown entities
//! are kept verbatim, and tag names match case-insensitively. Each item is
//! read on its own, so broken markup in one item (or after the last one)
//! never costs the others.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::time::Duration;
use tracing::debug;

use crate::error::{FeedError, FeedResult};
use crate::traits::BaseFeedSource;
use crate::types::FeedItem;

/// Some feed hosts reject default client identifiers.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36";

pub const FEED_TIMEOUT: Duration = Duration::from_secs(30);

const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";

/// HTTP feed source that fetches a single URL.
///
/// # Example
///
/// ```rust,ignore
/// use shelf_watcher::feed::HttpFeedSource;
///
/// let source = HttpFeedSource::new("https://www.goodreads.com/review/list_rss/1?shelf=to-read")?;
/// for item in source.fetch().await? {
///     println!("{} => {}", item.identity, item.title);
/// }
/// ```
pub struct HttpFeedSource {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpFeedSource {
    pub fn new(url: impl Into<String>) -> FeedResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            timeout: FEED_TIMEOUT,
        })
    }

    /// Override the request timeout (connect and read together).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl BaseFeedSource for HttpFeedSource {
    async fn fetch(&self) -> FeedResult<Vec<FeedItem>> {
        debug!(url = %self.url, "Fetching feed");
        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let items = parse_feed(&String::from_utf8_lossy(&body))?;
        debug!(url = %self.url, count = items.len(), "Feed parsed");
        Ok(items)
    }
}

/// Strip a literal `<![CDATA[ ... ]]>` wrapper. Anything else is returned unchanged.
pub fn strip_cdata_wrapper(value: &str) -> &str {
    if value.len() >= CDATA_OPEN.len() + CDATA_CLOSE.len()
        && value.starts_with(CDATA_OPEN)
        && value.ends_with(CDATA_CLOSE)
    {
        &value[CDATA_OPEN.len()..value.len() - CDATA_CLOSE.len()]
    } else {
        value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Guid,
    Link,
    Title,
}

impl Field {
    fn from_tag(name: &[u8]) -> Option<Self> {
        if name.eq_ignore_ascii_case(b"guid") {
            Some(Field::Guid)
        } else if name.eq_ignore_ascii_case(b"link") {
            Some(Field::Link)
        } else if name.eq_ignore_ascii_case(b"title") {
            Some(Field::Title)
        } else {
            None
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Field::Guid => "guid",
            Field::Link => "link",
            Field::Title => "title",
        }
    }
}

/// Fields collected for the `<item>` being read. The first occurrence of
/// each field wins.
#[derive(Default)]
struct ItemFields {
    guid: Option<String>,
    link: Option<String>,
    title: Option<String>,
}

impl ItemFields {
    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Guid => &mut self.guid,
            Field::Link => &mut self.link,
            Field::Title => &mut self.title,
        }
    }

    fn into_item(self) -> FeedItem {
        let clean = |v: Option<String>| {
            v.map(|s| strip_cdata_wrapper(s.trim()).to_string())
                .unwrap_or_default()
        };

        let guid = clean(self.guid);
        let identity = if guid.is_empty() { clean(self.link) } else { guid };

        FeedItem {
            identity,
            title: clean(self.title),
        }
    }
}

/// Parse a feed body into items, in document order.
///
/// Fails only when the body holds no `<item>` at all and is not readable as
/// markup; otherwise every item found is returned.
pub fn parse_feed(body: &str) -> FeedResult<Vec<FeedItem>> {
    let chunks = item_chunks(body);
    if chunks.is_empty() {
        check_markup(body)?;
    }

    Ok(chunks
        .into_iter()
        .map(|chunk| read_item(chunk).into_item())
        .collect())
}

fn lenient_reader(input: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(input);
    let config = reader.config_mut();
    config.trim_text(true);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    reader
}

fn check_markup(body: &str) -> FeedResult<()> {
    let mut reader = lenient_reader(body);
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => return Ok(()),
            Err(e) => {
                return Err(FeedError::Parse(format!(
                    "at byte {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
    }
}

/// Position of the first `<name>` (or `<name ` / `<name/`) open tag at or
/// after `from`. `lower` must already be ASCII-lowercased.
fn find_open_tag(lower: &str, name: &str, from: usize) -> Option<usize> {
    let needle = format!("<{}", name);
    let mut search = from;

    while let Some(i) = lower[search..].find(&needle) {
        let at = search + i;
        match lower.as_bytes().get(at + needle.len()) {
            Some(b'>') | Some(b'/') => return Some(at),
            Some(c) if c.is_ascii_whitespace() => return Some(at),
            _ => search = at + needle.len(),
        }
    }

    None
}

/// Inner markup of every `<item>` element. An unterminated item ends where
/// the next one opens, or at the end of the body.
fn item_chunks(body: &str) -> Vec<&str> {
    // ASCII lowercasing keeps byte offsets, so positions index `body` too.
    let lower = body.to_ascii_lowercase();
    let mut chunks = Vec::new();
    let mut pos = 0;

    while let Some(open) = find_open_tag(&lower, "item", pos) {
        let Some(gt) = lower[open..].find('>').map(|i| open + i) else {
            break;
        };
        let content_start = gt + 1;

        if lower[..gt].ends_with('/') {
            chunks.push("");
            pos = content_start;
            continue;
        }

        let close = lower[content_start..]
            .find("</item")
            .map(|i| content_start + i);
        let next_open = find_open_tag(&lower, "item", content_start);
        let end = match (close, next_open) {
            (Some(c), Some(n)) => c.min(n),
            (Some(c), None) => c,
            (None, Some(n)) => n,
            (None, None) => body.len(),
        };

        chunks.push(&body[content_start..end]);
        pos = end;
    }

    chunks
}

/// Read one item's fields. A field the reader could not close cleanly (a
/// stray `<` in its text, a syntax error) is taken from the raw text instead.
fn read_item(chunk: &str) -> ItemFields {
    let mut fields = ItemFields::default();
    let mut reader = lenient_reader(chunk);
    let mut open: Option<(Field, String)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if open.is_none() {
                    if let Some(f) = Field::from_tag(e.name().as_ref()) {
                        if fields.slot(f).is_none() {
                            open = Some((f, String::new()));
                        }
                    }
                }
            }
            Ok(Event::End(e)) => {
                let closes_open = matches!(
                    (&open, Field::from_tag(e.name().as_ref())),
                    (Some((f, _)), Some(ended)) if *f == ended
                );
                if closes_open {
                    if let Some((f, text)) = open.take() {
                        *fields.slot(f) = Some(text);
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if let Some((_, text)) = open.as_mut() {
                    match e.unescape() {
                        Ok(unescaped) => text.push_str(&unescaped),
                        Err(_) => text.push_str(&String::from_utf8_lossy(&e)),
                    }
                }
            }
            Ok(Event::CData(e)) => {
                if let Some((_, text)) = open.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }

    let lower = chunk.to_ascii_lowercase();
    for f in [Field::Guid, Field::Link, Field::Title] {
        if fields.slot(f).is_none() {
            *fields.slot(f) = raw_field(chunk, &lower, f);
        }
    }

    fields
}

/// Text between the first `<tag>` and the next `</tag`, unescaped when the
/// entities allow it.
fn raw_field(chunk: &str, lower: &str, field: Field) -> Option<String> {
    let tag = field.tag();
    let open = find_open_tag(lower, tag, 0)?;
    let gt = open + lower[open..].find('>')?;
    if lower[..gt].ends_with('/') {
        return Some(String::new());
    }

    let start = gt + 1;
    let end = start + lower[start..].find(&format!("</{}", tag))?;
    let raw = &chunk[start..end];

    Some(match quick_xml::escape::unescape(raw) {
        Ok(text) => text.into_owned(),
        Err(_) => raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    const SHELF_FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Reader's bookshelf: to-read</title>
    <item>
      <guid><![CDATA[https://www.goodreads.com/review/show/1001]]></guid>
      <title><![CDATA[Dune (Dune, #1)]]></title>
      <link><![CDATA[https://www.goodreads.com/review/show/1001?utm_medium=api]]></link>
      <book_id>234225</book_id>
    </item>
    <item>
      <guid>https://www.goodreads.com/review/show/1002</guid>
      <title>The Left Hand of Darkness</title>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_feed_reads_items_in_order() {
        let items = parse_feed(SHELF_FEED).unwrap();

        assert_eq!(
            items,
            vec![
                FeedItem::new("https://www.goodreads.com/review/show/1001", "Dune (Dune, #1)"),
                FeedItem::new(
                    "https://www.goodreads.com/review/show/1002",
                    "The Left Hand of Darkness"
                ),
            ]
        );
    }

    #[test]
    fn test_channel_title_is_not_an_item() {
        let items = parse_feed(SHELF_FEED).unwrap();
        assert!(items.iter().all(|i| i.title != "Reader's bookshelf: to-read"));
    }

    #[test]
    fn test_identity_falls_back_to_link() {
        let body = r#"<rss><channel><item>
            <title>Kindred</title>
            <link>https://www.goodreads.com/book/show/60931</link>
        </item></channel></rss>"#;

        let items = parse_feed(body).unwrap();
        assert_eq!(items[0].identity, "https://www.goodreads.com/book/show/60931");
    }

    #[test]
    fn test_empty_guid_falls_back_to_link() {
        let body = r#"<rss><item>
            <guid></guid>
            <link>https://example.com/b/1</link>
            <title>Kindred</title>
        </item></rss>"#;

        let items = parse_feed(body).unwrap();
        assert_eq!(items[0].identity, "https://example.com/b/1");
    }

    #[test]
    fn test_item_without_guid_or_link_has_empty_identity() {
        let body = "<rss><item><title>Orphan</title></item></rss>";

        let items = parse_feed(body).unwrap();
        assert_eq!(items.len(), 1);
        assert!(!items[0].is_processable());
        assert_eq!(items[0].title, "Orphan");
    }

    #[test]
    fn test_missing_title_defaults_to_empty() {
        let body = "<rss><item><guid>g-1</guid></item></rss>";

        let items = parse_feed(body).unwrap();
        assert_eq!(items[0].title, "");
    }

    #[test]
    fn test_escaped_cdata_wrapper_is_stripped() {
        let body = "<rss><item>\
            <guid>&lt;![CDATA[g-7]]&gt;</guid>\
            <title>&lt;![CDATA[Piranesi]]&gt;</title>\
            </item></rss>";

        let items = parse_feed(body).unwrap();
        assert_eq!(items[0], FeedItem::new("g-7", "Piranesi"));
    }

    #[test]
    fn test_tolerates_mismatched_tags_and_unknown_entities() {
        let body = "<rss><channel><item>\
            <guid>g-1</guid>\
            <title>Fish&nbsp;Tales</title>\
            <description>line one<br>line two</description>\
            </item></channel></rss>";

        let items = parse_feed(body).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].identity, "g-1");
        assert_eq!(items[0].title, "Fish&nbsp;Tales");
    }

    #[test]
    fn test_uppercase_tags_match() {
        let body = "<RSS><ITEM><GUID>g-1</GUID><TITLE>Loud</TITLE></ITEM></RSS>";

        let items = parse_feed(body).unwrap();
        assert_eq!(items[0], FeedItem::new("g-1", "Loud"));
    }

    #[test]
    fn test_stray_angle_bracket_in_title_is_kept() {
        let body = "<rss><item><guid>g1</guid><title>a < b</title></item></rss>";

        let items = parse_feed(body).unwrap();
        assert_eq!(items, vec![FeedItem::new("g1", "a < b")]);
    }

    #[test]
    fn test_stray_angle_bracket_with_entities() {
        let body = "<rss><item><guid>g1</guid><title>Tom &amp; Jerry <3</title></item></rss>";

        let items = parse_feed(body).unwrap();
        assert_eq!(items[0].title, "Tom & Jerry <3");
    }

    #[test]
    fn test_unclosed_trailing_comment_keeps_items() {
        let body = "<rss><item><guid>g1</guid><title>Dune</title></item>\
            <item><guid>g2</guid><title>Emma</title></item><!-- trailing";

        let items = parse_feed(body).unwrap();
        assert_eq!(
            items,
            vec![FeedItem::new("g1", "Dune"), FeedItem::new("g2", "Emma")]
        );
    }

    #[test]
    fn test_broken_item_does_not_cost_its_neighbours() {
        let body = "<rss><item><guid>g1</guid><title>Dune</title></item>\
            <item><guid>g2</guid><!-- unterminated <title>Lost</title></item>\
            <item><guid>g3</guid><title>Emma</title></item></rss>";

        let items = parse_feed(body).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], FeedItem::new("g1", "Dune"));
        assert_eq!(items[1].identity, "g2");
        assert_eq!(items[2], FeedItem::new("g3", "Emma"));
    }

    #[test]
    fn test_unterminated_last_item_is_read() {
        let body = "<rss><item><guid>g1</guid><title>Dune</title>";

        let items = parse_feed(body).unwrap();
        assert_eq!(items, vec![FeedItem::new("g1", "Dune")]);
    }

    #[test]
    fn test_unreadable_body_without_items_is_error() {
        let err = parse_feed("<rss><channel><!-- never closed").unwrap_err();
        assert!(matches!(err, FeedError::Parse(_)));
    }

    #[test]
    fn test_feed_without_items_is_empty() {
        let items = parse_feed("<rss><channel><title>Shelf</title></channel></rss>").unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_items_tag_is_not_an_item() {
        let body = "<rss><items><guid>g0</guid></items><item><guid>g1</guid></item></rss>";

        let items = parse_feed(body).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].identity, "g1");
    }

    #[test]
    fn test_strip_cdata_wrapper_exact_shape_only() {
        assert_eq!(strip_cdata_wrapper("<![CDATA[Dune]]>"), "Dune");
        assert_eq!(strip_cdata_wrapper("<![CDATA[]]>"), "");
        assert_eq!(strip_cdata_wrapper("<![CDATA[Dune"), "<![CDATA[Dune");
        assert_eq!(strip_cdata_wrapper("Dune]]>"), "Dune]]>");
        assert_eq!(strip_cdata_wrapper(" <![CDATA[Dune]]>"), " <![CDATA[Dune]]>");
        assert_eq!(strip_cdata_wrapper("Dune"), "Dune");
    }

    #[tokio::test]
    async fn test_fetch_sends_browser_user_agent() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/review/list_rss/1"))
            .and(|req: &Request| {
                req.headers.get("user-agent").and_then(|v| v.to_str().ok())
                    == Some(BROWSER_USER_AGENT)
            })
            .respond_with(ResponseTemplate::new(200).set_body_string(SHELF_FEED))
            .expect(1)
            .mount(&server)
            .await;

        let source = HttpFeedSource::new(format!("{}/review/list_rss/1", server.uri())).unwrap();
        let items = source.fetch().await.unwrap();

        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_non_success_is_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = HttpFeedSource::new(server.uri()).unwrap();
        let err = source.fetch().await.unwrap_err();

        assert!(matches!(err, FeedError::Status(503)));
    }

    #[test]
    fn test_default_feed_timeout() {
        assert_eq!(FEED_TIMEOUT, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_slow_feed_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(SHELF_FEED)
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let source = HttpFeedSource::new(server.uri())
            .unwrap()
            .with_timeout(Duration::from_millis(50));
        let err = source.fetch().await.unwrap_err();

        assert!(matches!(err, FeedError::Http(ref e) if e.is_timeout()));
    }
}
