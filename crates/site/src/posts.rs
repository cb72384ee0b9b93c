//! The blog, newest post first.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use std::sync::OnceLock;

/// `(year, month, day)` of a post.
pub type PostDate = (i32, u32, u32);

pub const POSTS: &[(PostDate, &str)] = &[
    (
        (2015, 3, 14),
        "Today I counted my gold again. It is all there. Every coin. \
         Some thief keeps leaving muddy footprints though and I would like \
         them to stop. <B>I can smell you.</B>",
    ),
    (
        (2015, 2, 28),
        "Somebody asked me \"why do you have a web site?\" Well, where else \
         would I publish my thoughts on treasure management & home security?",
    ),
    (
        (2015, 1, 31),
        "My new year's resolution: learn HTML. So far I have learned <BLINK> \
         and <MARQUEE> and I think that is all a dragon really needs.",
    ),
    (
        (2014, 12, 25),
        "Merry Christmas to all my readers. I received a very nice cup made of \
         gold. It tastes like burglar.",
    ),
    (
        (2014, 11, 5),
        "Fire safety tip: do not keep your treasure hoard next to a lake town. \
         Trust me on this one.",
    ),
    (
        (2014, 9, 22),
        "Happy birthday to the hobbits. Stay out of my mountain. \
         Frankly the mountain's 'backdoor' policy needs work.",
    ),
    (
        (2014, 6, 1),
        "Welcome to my web site! This is my very first post. \
         I'm still working on the guestbook.",
    ),
];

#[must_use]
pub fn post(date: PostDate) -> Option<&'static str> {
    POSTS
        .iter()
        .find(|(key, _)| *key == date)
        .map(|(_, text)| *text)
}

fn position(date: PostDate) -> Option<usize> {
    POSTS.iter().position(|(key, _)| *key == date)
}

/// The post listed before `date`; the first post is its own predecessor.
#[must_use]
pub fn prev_post(date: PostDate) -> Option<(PostDate, &'static str)> {
    position(date).map(|index| POSTS[index.saturating_sub(1)])
}

#[must_use]
pub fn next_post(date: PostDate) -> Option<(PostDate, &'static str)> {
    position(date).and_then(|index| POSTS.get(index + 1).copied())
}

/// First sixty characters of a post, used for titles and link text.
#[must_use]
pub fn headline(text: &str) -> &str {
    match text.char_indices().nth(60) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Characters left alone in a slug, the usual unreserved set plus `/`.
const SLUG_KEEP: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

fn slug_separator() -> &'static Regex {
    static SEPARATOR: OnceLock<Regex> = OnceLock::new();
    SEPARATOR.get_or_init(|| Regex::new(r#"[\s<>"']+"#).expect("constant regex"))
}

/// Lower-cased, dash separated and percent-encoded headline of a post.
#[must_use]
pub fn url_slug(text: &str) -> String {
    let lowered = headline(text).trim().to_lowercase();
    let dashed = slug_separator().replace_all(&lowered, "-");
    let trimmed = dashed.trim_matches('-');
    utf8_percent_encode(trimmed, SLUG_KEEP).to_string()
}

/// `<LI>` link list entries for `posts`.
#[must_use]
pub fn post_links<'a>(posts: impl IntoIterator<Item = &'a (PostDate, &'static str)>) -> String {
    posts
        .into_iter()
        .map(|(date, text)| {
            format!(
                "<LI><A HREF=\"{}\">{}</A>",
                post_href(*date, text),
                headline(text)
            )
        })
        .collect()
}

#[must_use]
pub fn post_href((year, month, day): PostDate, text: &str) -> String {
    format!("wirdpress/post/{year}/{month}/{day}/{}", url_slug(text))
}
