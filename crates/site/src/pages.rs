use crate::posts::{self, post_href, post_links, PostDate, POSTS};
use crate::render::{month_links, month_name, month_weeks, render_fragment, write_cms, Dressing};
use crate::smiley::Smiley;
use crate::templates::{
    ATOM, CALENDAR, DEFAULT_REASON, DEFAULT_TITLE, GUESTBOOK, GUESTBOOK_INTRO, INDEX_CONTENT,
    MISSING_ASSET_BODY, POST, POST_NOT_FOUND, RSS, SIMPLE_404, WEB_RING_CONTENT,
    WEB_RING_REDIRECT,
};
use crate::SiteState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use minijinja::context;
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tokio::io::AsyncReadExt;
use wyrm_core::extensions::result_ext::IntoBoxedError;
use wyrm_core::server::router::DEFAULT_ALLOWED_METHODS;
use wyrm_core::server::{Exchange, Handler, ServerError, ServerResult, NO_HEADERS};

/// Bytes of a guestbook submission that are looked at.
pub const GUESTBOOK_PAYLOAD_LIMIT: usize = 140;

const ASSET_READ_CHUNK: usize = 4096;

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S -0000";

/// Every page the site knows how to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    SmokeTest,
    Home,
    GuestbookIntro,
    Guestbook,
    WebRing,
    DQueryMax,
    Images,
    Post,
    AllPosts,
    WebRingPage,
    Calendar,
    Smiley,
    Feed,
    Robots,
    NotFound,
}

/// A [`Page`] bound to the shared site state, ready to be routed to.
#[derive(Debug, Clone)]
pub struct SitePage {
    pub page: Page,
    pub state: Arc<SiteState>,
}

impl SitePage {
    pub fn new(page: Page, state: Arc<SiteState>) -> Self {
        Self { page, state }
    }
}

#[async_trait]
impl Handler for SitePage {
    fn allowed_methods(&self) -> &[&str] {
        match self.page {
            Page::Guestbook => &["GET", "POST"],
            _ => DEFAULT_ALLOWED_METHODS,
        }
    }

    async fn process(&self, exchange: &mut Exchange<'_>) -> ServerResult<()> {
        match self.page {
            Page::SmokeTest => {
                exchange.write_header(200, "OK", NO_HEADERS).await?;
                exchange.write_content(b"It looks ok!").await
            }
            Page::Home => {
                let body = format!("{INDEX_CONTENT}{DEFAULT_REASON}");
                site_page(exchange, DEFAULT_TITLE, &body).await
            }
            Page::GuestbookIntro => site_page(exchange, DEFAULT_TITLE, GUESTBOOK_INTRO).await,
            Page::Guestbook => self.guestbook(exchange).await,
            Page::WebRing => {
                let dressing = Dressing::fuzzed(exchange.session());
                write_cms(
                    exchange,
                    200,
                    DEFAULT_REASON,
                    &dressing,
                    DEFAULT_TITLE,
                    "",
                    WEB_RING_REDIRECT.as_bytes(),
                )
                .await
            }
            Page::WebRingPage => {
                write_cms(
                    exchange,
                    200,
                    DEFAULT_REASON,
                    &Dressing::plain(),
                    DEFAULT_TITLE,
                    WEB_RING_CONTENT,
                    b"",
                )
                .await
            }
            Page::DQueryMax => dquery_max(exchange).await,
            Page::Images => self.image(exchange).await,
            Page::Post => post(exchange).await,
            Page::AllPosts => {
                let body = post_links(POSTS.iter());
                site_page(exchange, "All Smaug ghosts.", &body).await
            }
            Page::Calendar => calendar(exchange).await,
            Page::Smiley => {
                let name = exchange.route().group(1).unwrap_or_default();
                match Smiley::from_name(name) {
                    Some(smiley) => smiley.play(exchange).await,
                    None => site_page(exchange, DEFAULT_TITLE, "").await,
                }
            }
            Page::Feed => {
                let name = match exchange.route().group(1) {
                    Some("rss") => RSS,
                    _ => ATOM,
                };
                let feed = render_fragment(name, context! {})?;
                exchange
                    .write_header(200, DEFAULT_REASON, [("Content-Type", "application/xml")])
                    .await?;
                exchange.write_content(feed.as_bytes()).await
            }
            Page::Robots => {
                exchange
                    .write_header(200, "Robotic Dragons Permitted", NO_HEADERS)
                    .await?;
                exchange.write_content(b"# Please donate Bitcoins\n").await?;
                exchange
                    .write_content(b"Sitemap: /images/sitemaps.xml\n")
                    .await
            }
            Page::NotFound => {
                exchange
                    .write_header(404, "404 Not found", [("Content-Type", "text/html")])
                    .await?;
                exchange.write_content(&utf16_with_bom(SIMPLE_404)).await
            }
        }
    }
}

impl SitePage {
    async fn guestbook(&self, exchange: &mut Exchange<'_>) -> ServerResult<()> {
        if exchange.request().method == "POST" {
            let payload = exchange.request().payload.as_deref().unwrap_or_default();
            let payload = &payload[..payload.len().min(GUESTBOOK_PAYLOAD_LIMIT)];

            let message = url::form_urlencoded::parse(payload)
                .find(|(key, _)| key == "message")
                .map(|(_, value)| value.into_owned());

            if let Some(message) = message {
                tracing::debug!("Guestbook signed with {} bytes", message.len());
                self.state.sign_guestbook(message);
            }
        }

        let body = render_fragment(
            GUESTBOOK,
            context! { entries => self.state.guestbook_entries() },
        )?;

        site_page(exchange, DEFAULT_TITLE, &body).await
    }

    async fn image(&self, exchange: &mut Exchange<'_>) -> ServerResult<()> {
        let name = exchange.route().group(1).unwrap_or_default();
        let Some(path) = self.state.assets().resolve(name) else {
            return Err(ServerError::Internal(
                format!("asset name {name:?} leaves the asset directory").into(),
            ));
        };

        let asset = self
            .state
            .assets()
            .lookup(&path)
            .await
            .map_err(|err| ServerError::Internal(err.into_boxed_error()))?;

        let Some(asset) = asset else {
            return site_page(exchange, DEFAULT_TITLE, MISSING_ASSET_BODY).await;
        };

        let modified_secs = asset
            .modified
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX));
        let last_modified = DateTime::<Utc>::from(asset.modified)
            .format(HTTP_DATE_FORMAT)
            .to_string();

        let since = exchange
            .request()
            .fields
            .get_str("If-Modified-Since")
            .and_then(|value| DateTime::parse_from_rfc2822(value.trim()).ok());

        if since.is_some_and(|since| since.timestamp() >= modified_secs) {
            exchange
                .write_header(
                    304,
                    "One does not simply HTTP into Mordor",
                    [("Last-modified", last_modified)],
                )
                .await?;
            return exchange.write_content(b"What is HTTP?").await;
        }

        exchange
            .write_header(
                200,
                "",
                [
                    ("Content-Type", asset.content_type.to_owned()),
                    ("Last-modified", last_modified),
                    ("Accept-Ranges", "bytes".to_owned()),
                    ("Content-Range", "bytes 0-".to_owned()),
                    ("Expires", "Thu, Apr 01 Sep 1993 24:00:00 GMT".to_owned()),
                ],
            )
            .await?;

        let mut file = tokio::fs::File::open(&asset.path)
            .await
            .map_err(|err| ServerError::Internal(err.into_boxed_error()))?;
        let mut buffer = vec![0u8; ASSET_READ_CHUNK];

        loop {
            let read = file
                .read(&mut buffer)
                .await
                .map_err(|err| ServerError::Internal(err.into_boxed_error()))?;
            if read == 0 {
                return Ok(());
            }
            exchange.write_content(&buffer[..read]).await?;
        }
    }
}

/// Site frame with a session chosen encoding and charset.
async fn site_page(exchange: &mut Exchange<'_>, title: &str, body: &str) -> ServerResult<()> {
    let dressing = Dressing::fuzzed(exchange.session());
    write_cms(exchange, 200, DEFAULT_REASON, &dressing, title, body, b"").await
}

/// Year, month and day from the route, with month and day wrapped the way
/// the calendar links expect.
fn route_date(exchange: &Exchange<'_>) -> Option<PostDate> {
    let route = exchange.route();
    let year = route.group(1)?.parse().ok()?;
    let month = route.group(2)?.parse::<u32>().ok()? % 13;
    let day = route.group(3)?.parse::<u32>().ok()? % 32;
    Some((year, month, day))
}

fn missing_route_date() -> ServerError {
    ServerError::Internal("date route without a date".into())
}

async fn calendar(exchange: &mut Exchange<'_>) -> ServerResult<()> {
    let (year, month, day) = route_date(exchange).ok_or_else(missing_route_date)?;
    let (prev_link, next_link) = month_links(year, month);

    let mut picker = String::new();
    for week in month_weeks(year, month) {
        for cell in week {
            match cell {
                Some(date) => picker.push_str(&format!(
                    "<A HREF=wirdpress/calendar/{year}/{month}/{date}/>{date}</A> "
                )),
                None => picker.push_str("<A></A> "),
            }
        }
        picker.push_str("<BR>");
    }

    let mut body = render_fragment(
        CALENDAR,
        context! {
            month => month_name(month),
            prev_link => prev_link,
            next_link => next_link,
            picker => picker,
        },
    )?;

    match posts::post((year, month, day)) {
        Some(text) => body.push_str(&format!(
            "<A HREF=\"{}\">{}</A>",
            post_href((year, month, day), text),
            posts::headline(text)
        )),
        None => body.push_str("Sorry no posts on this day."),
    }

    let title = format!("Posts on {year} {} {day}", month_name(month));
    site_page(exchange, &title, &body).await
}

async fn post(exchange: &mut Exchange<'_>) -> ServerResult<()> {
    let date = route_date(exchange).ok_or_else(missing_route_date)?;
    let (year, month, day) = date;

    let Some(text) = posts::post(date) else {
        return write_cms(
            exchange,
            404,
            "Not found",
            &Dressing::plain(),
            "Post not found",
            POST_NOT_FOUND,
            b"",
        )
        .await;
    };

    let mut nav = Vec::new();
    if let Some((prev_date, prev_text)) = posts::prev_post(date) {
        nav.push(format!(
            "<A HREF=\"{}\">PREV</A>",
            post_href(prev_date, prev_text)
        ));
    }
    if let Some((next_date, next_text)) = posts::next_post(date) {
        nav.push(format!(
            "<A HREF=\"{}\">NEXT</A>",
            post_href(next_date, next_text)
        ));
    }

    let post_date = format!(
        "<A HREF=wirdpress/calendar/{year}/{month}/{day}/>{year} {} {day}</A>",
        month_name(month)
    );
    let body = render_fragment(
        POST,
        context! {
            date => post_date,
            entry => text,
            nav => nav.join("\n"),
        },
    )?;

    site_page(exchange, posts::headline(text), &body).await
}

async fn dquery_max(exchange: &mut Exchange<'_>) -> ServerResult<()> {
    exchange.stream();
    exchange
        .write_header(200, "OK", [("Content-type", "application/javascript")])
        .await?;

    for index in 0..100_000u32 {
        exchange
            .write_content(b"/* DragonQuery maximum JS file*/\r\n")
            .await?;
        exchange.write_content(b"var v").await?;
        exchange.write_content(index.to_string().as_bytes()).await?;
        exchange
            .write_content(b"; /* pre-allocate some bytes */\n")
            .await?;
    }

    exchange.write_content(b"\xFF\xFE\x80").await
}

/// Little endian UTF-16 led by a byte order mark.
#[must_use]
pub fn utf16_with_bom(text: &str) -> Vec<u8> {
    let mut out = vec![0xFF, 0xFE];
    for unit in text.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}
