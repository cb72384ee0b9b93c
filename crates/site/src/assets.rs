//! Static files served under `/images/`.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

pub const DEFAULT_CONTENT_TYPE: &str = "text/html";

const CONTENT_TYPES: &[(&str, &str)] = &[
    ("bmp", "image/bmp"),
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("ogg", "application/ogg"),
    ("xml", "application/xml"),
];

/// Any requested name containing this is answered with the song itself.
const SONG_MARKER: &str = "songofsmaug";
const SONG_FILE: &str = "songofsmaug.ogg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub content_type: &'static str,
}

#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a requested name to a path below the root. `None` when the name
    /// would leave the root.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let name = name.replace("..", "_");
        let name = if name.contains(SONG_MARKER) {
            SONG_FILE.to_owned()
        } else {
            name
        };

        let mut path = self.root.clone();
        for component in Path::new(&name).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        Some(path)
    }

    /// Looks up a regular file. `Ok(None)` when there is nothing to serve.
    pub async fn lookup(&self, path: &Path) -> io::Result<Option<Asset>> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };

        if !metadata.is_file() {
            return Ok(None);
        }

        Ok(Some(Asset {
            path: path.to_path_buf(),
            modified: metadata.modified()?,
            content_type: content_type(path),
        }))
    }
}

#[must_use]
pub fn content_type(path: &Path) -> &'static str {
    let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");
    CONTENT_TYPES
        .iter()
        .find(|(known, _)| *known == extension)
        .map_or(DEFAULT_CONTENT_TYPE, |(_, content_type)| *content_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_references_are_neutralised() {
        let store = AssetStore::new("/srv/assets");
        assert_eq!(
            store.resolve("../../etc/passwd"),
            Some(PathBuf::from("/srv/assets/_/_/etc/passwd"))
        );
        assert_eq!(
            store.resolve("./stylesheet.css"),
            Some(PathBuf::from("/srv/assets/stylesheet.css"))
        );
    }

    #[test]
    fn absolute_names_are_refused() {
        let store = AssetStore::new("/srv/assets");
        assert_eq!(store.resolve("/etc/passwd"), None);
    }

    #[test]
    fn every_song_variant_is_the_song() {
        let store = AssetStore::new("assets");
        assert_eq!(
            store.resolve("../images/songofsmaug_low.ogg"),
            Some(PathBuf::from("assets/songofsmaug.ogg"))
        );
    }

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(content_type(Path::new("a/dquery.js")), "application/javascript");
        assert_eq!(content_type(Path::new("banner.bmp")), "image/bmp");
        assert_eq!(content_type(Path::new("UTF-8-test.txt")), DEFAULT_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn missing_and_directory_lookups_are_none() {
        let dir = std::env::temp_dir();
        let store = AssetStore::new(&dir);
        assert_eq!(store.lookup(&dir).await.expect("lookup"), None);
        assert_eq!(
            store
                .lookup(&dir.join("wyrm-definitely-missing.bmp"))
                .await
                .expect("lookup"),
            None
        );
    }
}
