//! Requests the site's pages through the real pipeline with a calm fuzz
//! session and checks what comes back on the wire.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing_test::traced_test;
use wyrm_core::fuzz::Fuzzer;
use wyrm_core::server::pipeline::serve_connection;
use wyrm_core::server::RestartPolicy;
use wyrm_core::wire::fuzz_stream::FuzzStream;
use wyrm_site::assets::AssetStore;
use wyrm_site::pages::utf16_with_bom;
use wyrm_site::templates::SIMPLE_404;
use wyrm_site::{router, SiteState};

fn asset_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("wyrm-site-{}-{name}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create asset dir");
    dir
}

fn site(assets: impl Into<PathBuf>) -> Arc<SiteState> {
    Arc::new(SiteState::new(AssetStore::new(assets)))
}

async fn converse(state: &Arc<SiteState>, input: &[u8]) -> Vec<u8> {
    let (server, mut client) = tokio::io::duplex(1024 * 1024);
    let session = Fuzzer::new(1, 1000).session();
    let router = router(state).expect("site routes");
    let restart = RestartPolicy::new(1000);

    let serving = async {
        let mut wire = FuzzStream::new(server, session.clone());
        serve_connection(&mut wire, &session, &router, &restart).await;
    };

    let talking = async {
        client.write_all(input).await.expect("write request");
        client.shutdown().await.expect("half close");

        let mut output = Vec::new();
        client.read_to_end(&mut output).await.expect("read response");
        output
    };

    let ((), output) = tokio::join!(serving, talking);
    output
}

async fn get(state: &Arc<SiteState>, path: &str) -> Vec<u8> {
    converse(state, format!("GET {path} HTTP/1.0\r\n\r\n").as_bytes()).await
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[tokio::test]
async fn smoke_test_answers_plainly() {
    let output = text(&get(&site("assets"), "/smoketest").await);
    assert!(output.starts_with("HTTP/1.1 200 OK\r\nContent-Length: 12\r\n"));
    assert!(output.ends_with("\r\n\r\nIt looks ok!"));
}

#[tokio::test]
#[traced_test]
async fn home_page_is_streamed_with_the_dragon_header() {
    let output = text(&get(&site("assets"), "/").await);

    assert!(output.starts_with("HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n"));
    assert!(output.contains("X-Dragon: \x1b]2;Smaug was here!\x07\r\n"));
    assert!(output.contains("Transfer-Encoding: chunked\r\n"));
    assert!(output.contains("Welcome to my web site!"));
    assert!(output.ends_with("\r\n0\r\n\r\n"));
    assert!(logs_contain("Request: - /"));
}

#[tokio::test]
async fn robots_file_lists_the_sitemap() {
    let output = text(&get(&site("assets"), "/robots.txt").await);
    assert!(output.starts_with("HTTP/1.1 200 Robotic Dragons Permitted\r\n"));
    assert!(output.ends_with("# Please donate Bitcoins\nSitemap: /images/sitemaps.xml\n"));
}

#[tokio::test]
async fn unknown_pages_get_a_utf16_frameset() {
    let output = get(&site("assets"), "/nothing/here").await;
    let body = utf16_with_bom(SIMPLE_404);

    let head = text(&output[..output.len() - body.len()]);
    assert!(head.starts_with("HTTP/1.1 404 404 Not found\r\nContent-Type: text/html\r\n"));
    assert!(head.contains(&format!("Content-Length: {}\r\n", body.len())));
    assert!(output.ends_with(&body));
}

/// WHY: Visitors can leave messages, and the page must not run them.
/// WHAT: A posted message is stored and rendered with markup escaped.
#[tokio::test]
async fn guestbook_post_is_stored_and_escaped() {
    let state = site("assets");
    let form = "message=%3Cb%3Ehi%3C%2Fb%3E&other=1";
    let request = format!(
        "POST /cgi-bin/guestbook.cgi HTTP/1.0\r\nContent-Length: {}\r\n\r\n{form}",
        form.len()
    );

    let output = text(&converse(&state, request.as_bytes()).await);

    assert!(output.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(output.contains("<DIV>&lt;b&gt;hi&lt;&#x2f;b&gt;</DIV>"));
    assert_eq!(state.guestbook_entries(), vec!["<b>hi</b>".to_owned()]);
}

#[tokio::test]
async fn guestbook_ignores_anything_past_the_limit() {
    let state = site("assets");
    let form = format!("padding={}&message=late", "x".repeat(140));
    let request = format!(
        "POST /cgi-bin/guestbook.cgi HTTP/1.0\r\nContent-Length: {}\r\n\r\n{form}",
        form.len()
    );

    converse(&state, request.as_bytes()).await;
    assert!(state.guestbook_entries().is_empty());
}

#[tokio::test]
async fn other_pages_refuse_posts() {
    let output = text(
        &converse(
            &site("assets"),
            b"POST /guestbook.htm HTTP/1.0\r\nContent-Length: 0\r\n\r\n",
        )
        .await,
    );
    assert!(output.starts_with("HTTP/1.1 405 Method not allow\r\n"));
}

#[tokio::test]
async fn images_are_served_from_the_asset_directory() {
    let dir = asset_dir("images");
    std::fs::write(dir.join("hoard.css"), "body { color: gold; }").expect("write asset");
    let state = site(&dir);

    let output = text(&get(&state, "/images/hoard.css").await);
    assert!(output.starts_with("HTTP/1.1 200 \r\nContent-Type: text/css\r\n"));
    assert!(output.contains("Accept-Ranges: bytes\r\n"));
    assert!(output.contains("Expires: Thu, Apr 01 Sep 1993 24:00:00 GMT\r\n"));
    assert!(output.ends_with("\r\n\r\nbody { color: gold; }"));

    let conditional = converse(
        &state,
        b"GET /images/hoard.css HTTP/1.0\r\nIf-Modified-Since: Thu, 01 Jan 2099 00:00:00 +0000\r\n\r\n",
    )
    .await;
    let conditional = text(&conditional);
    assert!(conditional.starts_with("HTTP/1.1 304 One does not simply HTTP into Mordor\r\n"));
    assert!(conditional.ends_with("\r\n\r\nWhat is HTTP?"));

    let stale = converse(
        &state,
        b"GET /images/hoard.css HTTP/1.0\r\nIf-Modified-Since: Mon, 01 Jan 1990 00:00:00 +0000\r\n\r\n",
    )
    .await;
    assert!(text(&stale).starts_with("HTTP/1.1 200 \r\n"));

    std::fs::remove_dir_all(&dir).expect("cleanup");
}

#[tokio::test]
async fn missing_image_gets_a_site_page() {
    let dir = asset_dir("missing");
    let output = text(&get(&site(&dir), "/images/banner.bmp").await);

    assert!(output.starts_with("HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n"));
    assert!(output.contains("<h1>404 Not Found</h2>"));

    std::fs::remove_dir_all(&dir).expect("cleanup");
}

#[tokio::test]
async fn song_requests_are_redirected_to_the_song() {
    let dir = asset_dir("song");
    std::fs::write(dir.join("songofsmaug.ogg"), b"OggS").expect("write asset");

    let output = text(&get(&site(&dir), "/images/songofsmaug_remix.ogg").await);
    assert!(output.starts_with("HTTP/1.1 200 \r\nContent-Type: application/ogg\r\n"));
    assert!(output.ends_with("OggS"));

    std::fs::remove_dir_all(&dir).expect("cleanup");
}

#[tokio::test]
async fn no_content_smiley_is_written_raw() {
    let output = get(&site("assets"), "/smiley/haha2.gif").await;
    assert_eq!(output, b"HTTP/1.0 204\r\n\r\n");
}

#[tokio::test]
async fn emoji_header_smiley_closes_short() {
    let output = text(&get(&site("assets"), "/smiley/oops.gif").await);
    assert_eq!(
        output,
        "HTTP/1.0 200\r\nEmoji: 🐲\r\nContent-Length: 100\r\n\r\n"
    );
}

#[tokio::test]
async fn bounce_smileys_redirect_to_each_other() {
    let state = site("assets");
    assert_eq!(
        text(&get(&state, "/smiley/bounce1.gif").await),
        "HTTP/1.0 302\r\nLocation: bounce2.gif\r\nContent-Length: 0\r\n\r\n"
    );
    assert_eq!(
        text(&get(&state, "/smiley/bounce2.gif").await),
        "HTTP/1.0 301\r\nLocation: bounce1.gif\r\nContent-Length: 0\r\n\r\n"
    );
}

#[tokio::test]
async fn messy_header_smiley_uses_legacy_encodings() {
    let output = get(&site("assets"), "/smiley/stupid4.gif").await;
    let (koi8, _, _) = encoding_rs::KOI8_R.encode("K: Кракозябры\r\n");

    assert!(output.starts_with(b"HTTP/1.1 200\r\n"));
    assert!(output.windows(koi8.len()).any(|window| window == &koi8[..]));
    assert!(output.ends_with(b"Set-Cookie: SMAUGYO"));
}

#[tokio::test]
async fn unknown_smiley_falls_back_to_the_site() {
    let output = text(&get(&site("assets"), "/smiley/grumpy.gif").await);
    assert!(output.starts_with("HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n"));
}

#[tokio::test]
async fn calendar_links_days_and_neighbouring_months() {
    let output = text(&get(&site("assets"), "/wirdpress/calendar/2015/2/28/").await);

    assert!(output.contains("<TITLE>Posts on 2015 Feb 28</TITLE>"));
    assert!(output.contains("<A HREF=wirdpress/calendar/2015/2/1/>1</A> "));
    assert!(output.contains("HREF=\"/wirdpress/calendar/2015/1/1/\""));
    assert!(output.contains("HREF=\"/wirdpress/calendar/2015/3/1/\""));
    assert!(output.contains("<A HREF=\"wirdpress/post/2015/2/28/somebody-asked-me"));
}

#[tokio::test]
async fn calendar_wraps_impossible_months() {
    let output = text(&get(&site("assets"), "/wirdpress/calendar/2015/13/40/").await);
    assert!(output.contains("<TITLE>Posts on 2015 Dummy 8</TITLE>"));
    assert!(output.contains("Sorry no posts on this day."));
}

#[tokio::test]
async fn posts_link_to_their_neighbours() {
    let output = text(&get(&site("assets"), "/wirdpress/post/2015/2/28/whatever").await);

    assert!(output.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(output.contains("Posted on <A HREF=wirdpress/calendar/2015/2/28/>2015 Feb 28</A>"));
    assert!(output.contains("<A HREF=\"wirdpress/post/2015/3/14/today-i-counted"));
    assert!(output.contains("\">PREV</A>"));
    assert!(output.contains("\">NEXT</A>"));
}

#[tokio::test]
async fn missing_post_is_a_404_page() {
    let output = text(&get(&site("assets"), "/wirdpress/post/1999/1/1/gone").await);
    assert!(output.starts_with("HTTP/1.1 404 Not found\r\nContent-Type: text/html\r\n"));
    assert!(output.contains("Sorry, Smaug must have incinerated this post."));
}

#[tokio::test]
async fn feeds_are_xml() {
    let state = site("assets");

    let rss = text(&get(&state, "/rss.xml").await);
    assert!(rss.contains("Content-Type: application/xml\r\n"));
    assert!(rss.contains("<rss version=\"2.0\">"));

    let atom = text(&get(&state, "/atom.xml").await);
    assert!(atom.contains("<feed xmlns=\"http://www.w3.org/2005/Atom\">"));
}

#[tokio::test]
async fn web_ring_is_prefixed_with_a_refresh() {
    let output = text(&get(&site("assets"), "/web_ring.htm").await);
    assert!(output.contains("<META HTTP-EQUIV=\"Refresh\" content=\"0; URL=/wirdpress/page/web_ring\">"));

    let page = text(&get(&site("assets"), "/wirdpress/page/web_ring").await);
    assert!(page.contains("Want to be part of the web ring?"));
    assert!(page.contains("竜の陰謀"));
}

#[tokio::test]
async fn dquery_max_streams_every_fragment() {
    let output = get(&site("assets"), "/images/dquery-max.js").await;

    let head = text(&output[..200]);
    assert!(head.starts_with("HTTP/1.1 200 OK\r\nContent-Type: application/javascript\r\n"));
    assert!(text(&output).contains("\r\n5\r\n99999\r\n"));
    assert!(output.ends_with(b"\r\n3\r\n\xFF\xFE\x80\r\n0\r\n\r\n"));
}
