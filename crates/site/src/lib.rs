//! The dragon fan site served by wyrm: a small, deliberately broken web
//! site built on the fault injecting server core.

pub mod assets;
pub mod pages;
pub mod posts;
pub mod render;
pub mod smiley;
pub mod templates;

use assets::AssetStore;
use pages::{Page, SitePage};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use wyrm_core::server::Router;

/// Messages kept by the guestbook; older ones fall off the end.
pub const GUESTBOOK_CAPACITY: usize = 20;

/// Ordered routing table, first match wins.
pub const ROUTES: &[(&str, Page)] = &[
    (r"/smoketest", Page::SmokeTest),
    (r"/(index\.htm)?", Page::Home),
    (r"/guestbook\.htm", Page::GuestbookIntro),
    (r"/cgi-bin/guestbook\.cgi", Page::Guestbook),
    (r"/web_ring\.htm", Page::WebRing),
    (r"/images/dquery-max\.js", Page::DQueryMax),
    (r"/images/(.*)", Page::Images),
    (r"/wirdpress/post/(\d{4})/(\d{1,2})/(\d{1,2})/(.*)", Page::Post),
    (r"/wirdpress/post/all/posts", Page::AllPosts),
    (r"/wirdpress/page/web_ring", Page::WebRingPage),
    (r"/wirdpress/calendar/(\d{4})/(\d{1,2})/(\d{1,2})/", Page::Calendar),
    (r"/smiley/(\w+)\.gif", Page::Smiley),
    (r"/(rss|atom)\.xml", Page::Feed),
    (r"/robots\.txt", Page::Robots),
    (r"/.*", Page::NotFound),
];

/// State shared by every page across connections and listener restarts.
#[derive(Debug)]
pub struct SiteState {
    guestbook: Mutex<VecDeque<String>>,
    assets: AssetStore,
}

impl SiteState {
    #[must_use]
    pub fn new(assets: AssetStore) -> Self {
        Self {
            guestbook: Mutex::new(VecDeque::with_capacity(GUESTBOOK_CAPACITY)),
            assets,
        }
    }

    #[must_use]
    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    pub fn sign_guestbook(&self, message: String) {
        let mut guestbook = self.guestbook.lock().unwrap_or_else(PoisonError::into_inner);
        if guestbook.len() == GUESTBOOK_CAPACITY {
            guestbook.pop_front();
        }
        guestbook.push_back(message);
    }

    /// Oldest first.
    #[must_use]
    pub fn guestbook_entries(&self) -> Vec<String> {
        self.guestbook
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

/// Builds the site's [`Router`] over `state`.
pub fn router(state: &Arc<SiteState>) -> Result<Router, regex::Error> {
    let mut router = Router::new();
    for (pattern, page) in ROUTES {
        router.add(pattern, Arc::new(SitePage::new(*page, state.clone())))?;
    }
    Ok(router)
}
