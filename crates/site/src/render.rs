//! Turns page text into bytes on the wire: session picked codec, charset
//! declaration and doctype, and the common page framing.

use crate::posts::{post_links, POSTS};
use crate::templates::{self, BANNER_NAV, SITE, X_DRAGON};
use chrono::{Datelike, NaiveDate};
use encoding_rs::{Encoding, UTF_8};
use minijinja::context;
use wyrm_core::extensions::result_ext::IntoBoxedError;
use wyrm_core::fuzz::FuzzSession;
use wyrm_core::server::{Exchange, ServerError, ServerResult};

pub const RECENT_POSTS: usize = 3;

/// Character encoding a page body is written in, plus the `<META>`
/// declaration (possibly lying about it) placed in the head.
#[derive(Debug, Clone)]
pub struct Dressing {
    pub encoding: &'static Encoding,
    pub charset: String,
}

impl Default for Dressing {
    fn default() -> Self {
        Self::plain()
    }
}

impl Dressing {
    /// UTF-8 with no charset declaration.
    #[must_use]
    pub fn plain() -> Self {
        Self {
            encoding: UTF_8,
            charset: String::new(),
        }
    }

    pub fn fuzzed(session: &FuzzSession) -> Self {
        let codec = session.codec();
        let charset = session.charset().replace("{name}", &codec.declared);

        Self {
            encoding: Encoding::for_label(codec.codec.as_bytes()).unwrap_or(UTF_8),
            charset,
        }
    }

    /// Encodes `text`; characters the encoding cannot represent are
    /// replaced.
    #[must_use]
    pub fn encode(&self, text: &str) -> Vec<u8> {
        let (bytes, _, _) = self.encoding.encode(text);
        bytes.into_owned()
    }
}

/// Renders the site frame around `title` and `body`.
pub fn render_page(
    session: &FuzzSession,
    dressing: &Dressing,
    title: &str,
    body: &str,
) -> Result<String, minijinja::Error> {
    templates::render(
        SITE,
        context! {
            doctype => session.doctype(),
            charset => dressing.charset,
            banner => BANNER_NAV,
            title => title,
            body => body,
            recent_posts => post_links(POSTS.iter().take(RECENT_POSTS)),
        },
    )
}

/// Renders a template, turning failures into an internal server error.
pub fn render_fragment(name: &str, context: minijinja::Value) -> ServerResult<String> {
    templates::render(name, context).map_err(|err| ServerError::Internal(err.into_boxed_error()))
}

/// Streams a full site page. `prefix` goes out verbatim ahead of the
/// encoded document.
pub async fn write_cms(
    exchange: &mut Exchange<'_>,
    status: u16,
    reason: &str,
    dressing: &Dressing,
    title: &str,
    body: &str,
    prefix: &[u8],
) -> ServerResult<()> {
    exchange.stream();
    exchange
        .write_header(
            status,
            reason,
            [("Content-Type", "text/html"), ("X-Dragon", X_DRAGON)],
        )
        .await?;

    let page = render_page(exchange.session(), dressing, title, body)
        .map_err(|err| ServerError::Internal(err.into_boxed_error()))?;
    let mut document = prefix.to_vec();
    document.extend(dressing.encode(&page));
    exchange.write_content(&document).await
}

pub const MONTHS: [&str; 13] = [
    "Dummy", "Jan", "Feb", "Mar", "May", "Jun", "July", "Aug", "Nov", "Sep", "Oct", "Nov", "Dec",
];

#[must_use]
pub fn month_name(month: u32) -> &'static str {
    MONTHS.get(month as usize).copied().unwrap_or(MONTHS[0])
}

/// Weeks of a month, Monday first, with `None` padding outside the month.
/// Months that do not exist have no weeks.
#[must_use]
pub fn month_weeks(year: i32, month: u32) -> Vec<[Option<u32>; 7]> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };

    let mut weeks = Vec::new();
    let mut week = [None; 7];
    let mut day = first;

    loop {
        let column = day.weekday().num_days_from_monday() as usize;
        week[column] = Some(day.day());

        if column == 6 {
            weeks.push(week);
            week = [None; 7];
        }

        match day.succ_opt() {
            Some(next) if next.month() == month => day = next,
            _ => break,
        }
    }

    if week.iter().any(Option::is_some) {
        weeks.push(week);
    }
    weeks
}

/// Links of the previous and next month, each pointing at its first day.
#[must_use]
pub fn month_links(year: i32, month: u32) -> (String, String) {
    let (prev_year, prev_month) = if month <= 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    };

    let (next_year, next_month) = if month + 1 >= 13 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };

    (
        format!("/wirdpress/calendar/{prev_year}/{prev_month}/1/"),
        format!("/wirdpress/calendar/{next_year}/{next_month}/1/"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use wyrm_core::fuzz::Fuzzer;

    #[test]
    fn plain_dressing_is_utf8_without_declaration() {
        let dressing = Dressing::plain();
        assert_eq!(dressing.encoding, UTF_8);
        assert!(dressing.charset.is_empty());
        assert_eq!(dressing.encode("🐲"), "🐲".as_bytes());
    }

    #[test]
    fn fuzzed_dressing_declares_a_name() {
        let session = Fuzzer::new(4, 1000).session();
        for _ in 0..50 {
            let dressing = Dressing::fuzzed(&session);
            assert!(!dressing.charset.contains("{name}"));
        }
    }

    #[test]
    fn koi8_encodes_cyrillic_into_single_bytes() {
        let dressing = Dressing {
            encoding: encoding_rs::KOI8_R,
            charset: String::new(),
        };
        assert_eq!(dressing.encode("Я").len(), 1);
    }

    #[test]
    fn page_contains_title_body_and_recent_posts() {
        let session = Fuzzer::new(1, 1000).session();
        let page = render_page(&session, &Dressing::plain(), "Hoard", "<P>gold</P>")
            .expect("renders");

        assert!(page.contains("<TITLE>Hoard</TITLE>"));
        assert!(page.contains("<P>gold</P>"));
        assert_eq!(page.matches("<LI><A HREF=\"wirdpress/post/").count(), RECENT_POSTS);
        assert!(!page.contains("{{"));
    }

    #[test]
    fn february_2015_starts_on_a_sunday() {
        let weeks = month_weeks(2015, 2);
        assert_eq!(weeks.len(), 5);
        assert_eq!(weeks[0], [None, None, None, None, None, None, Some(1)]);
        assert_eq!(weeks[4][5], Some(28));
        assert_eq!(weeks[4][6], None);
    }

    #[test]
    fn month_zero_has_no_weeks() {
        assert!(month_weeks(2015, 0).is_empty());
        assert_eq!(month_name(0), "Dummy");
        assert_eq!(month_name(4), "May");
    }

    #[test]
    fn links_wrap_around_the_year() {
        assert_eq!(
            month_links(2015, 1),
            (
                "/wirdpress/calendar/2014/12/1/".to_owned(),
                "/wirdpress/calendar/2015/2/1/".to_owned()
            )
        );
        assert_eq!(month_links(2015, 12).1, "/wirdpress/calendar/2016/1/1/");
        assert_eq!(month_links(2015, 0).0, "/wirdpress/calendar/2014/12/1/");
    }
}
