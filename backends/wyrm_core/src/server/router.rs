use crate::server::errors::ServerResult;
use crate::server::exchange::Exchange;
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;

pub const DEFAULT_ALLOWED_METHODS: &[&str] = &["GET", "HEAD"];

/// Page logic plugged into the response lifecycle. The [`Exchange`] owns
/// framing, compression and the connection; a handler only decides what
/// to write.
#[async_trait]
pub trait Handler: Send + Sync {
    fn allowed_methods(&self) -> &[&str] {
        DEFAULT_ALLOWED_METHODS
    }

    async fn process(&self, exchange: &mut Exchange<'_>) -> ServerResult<()>;
}

/// Result of matching a path against a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub path: String,
    pub groups: Vec<Option<String>>,
}

impl RouteMatch {
    /// Capture group `index`, starting at 1 like the pattern syntax.
    #[must_use]
    pub fn group(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|index| self.groups.get(index))
            .and_then(Option::as_deref)
    }
}

/// Ordered `(pattern, handler)` table; the first pattern matching the whole
/// path wins.
#[derive(Clone, Default)]
pub struct Router {
    routes: Vec<(Regex, Arc<dyn Handler>)>,
}

impl core::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.routes.iter().map(|(pattern, _)| pattern.as_str()))
            .finish()
    }
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(
        mut self,
        pattern: &str,
        handler: impl Handler + 'static,
    ) -> Result<Self, regex::Error> {
        self.add(pattern, Arc::new(handler))?;
        Ok(self)
    }

    pub fn add(&mut self, pattern: &str, handler: Arc<dyn Handler>) -> Result<(), regex::Error> {
        let anchored = Regex::new(&format!("^(?:{pattern})$"))?;
        self.routes.push((anchored, handler));
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<(Arc<dyn Handler>, RouteMatch)> {
        self.routes.iter().find_map(|(pattern, handler)| {
            let captures = pattern.captures(path)?;
            let groups = captures
                .iter()
                .skip(1)
                .map(|group| group.map(|found| found.as_str().to_owned()))
                .collect();

            Some((
                handler.clone(),
                RouteMatch {
                    path: path.to_owned(),
                    groups,
                },
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named;

    #[async_trait]
    impl Handler for Named {
        async fn process(&self, _exchange: &mut Exchange<'_>) -> ServerResult<()> {
            Ok(())
        }
    }

    fn router() -> Router {
        Router::new()
            .route(r"/(index\.htm)?", Named)
            .and_then(|router| router.route(r"/images/(.*)", Named))
            .and_then(|router| router.route(r"/.*", Named))
            .expect("valid patterns")
    }

    #[test]
    fn matches_whole_path_only() {
        let router = router();

        let (_, found) = router.resolve("/").expect("root");
        assert_eq!(found.group(1), None);

        let (_, found) = router.resolve("/index.htm").expect("index");
        assert_eq!(found.group(1), Some("index.htm"));

        let (_, found) = router.resolve("/images/a/b.css").expect("images");
        assert_eq!(found.group(1), Some("a/b.css"));
        assert_eq!(found.group(0), None);

        let (_, found) = router.resolve("/index.html").expect("fallback");
        assert!(found.groups.is_empty());
    }

    #[test]
    fn nothing_matches_an_empty_table() {
        assert!(Router::new().resolve("/").is_none());
        assert_eq!(router().len(), 3);
    }
}
