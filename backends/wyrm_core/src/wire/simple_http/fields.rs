use super::errors::{HttpError, HttpResult};

/// Ordered header collection keyed by normalized (title-cased) name.
///
/// Lookups are case-insensitive since every key goes through
/// [`Fields::normalize_key`]. Replacing an existing entry keeps its
/// original position, so serialization follows first insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
}

impl Fields {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Upper-cases every letter that follows a non-letter and lower-cases
    /// the rest: `content-length` becomes `Content-Length`, `ETAG`
    /// becomes `Etag`.
    #[must_use]
    pub fn normalize_key(key: &[u8]) -> Vec<u8> {
        let mut previous_is_letter = false;
        key.iter()
            .map(|byte| {
                let normalized = if previous_is_letter {
                    byte.to_ascii_lowercase()
                } else {
                    byte.to_ascii_uppercase()
                };
                previous_is_letter = byte.is_ascii_alphabetic();
                normalized
            })
            .collect()
    }

    fn position(&self, key: &[u8]) -> Option<usize> {
        let key = Self::normalize_key(key);
        self.entries.iter().position(|(name, _)| *name == key)
    }

    #[must_use]
    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<&[u8]> {
        self.position(key.as_ref())
            .map(|index| self.entries[index].1.as_slice())
    }

    /// Lossy utf-8 view of a value.
    #[must_use]
    pub fn get_str(&self, key: impl AsRef<[u8]>) -> Option<String> {
        self.get(key)
            .map(|value| String::from_utf8_lossy(value).into_owned())
    }

    #[must_use]
    pub fn contains(&self, key: impl AsRef<[u8]>) -> bool {
        self.position(key.as_ref()).is_some()
    }

    pub fn set(&mut self, key: impl AsRef<[u8]>, value: impl Into<Vec<u8>>) {
        let value = value.into();
        match self.position(key.as_ref()) {
            Some(index) => self.entries[index].1 = value,
            None => self
                .entries
                .push((Self::normalize_key(key.as_ref()), value)),
        }
    }

    pub fn remove(&mut self, key: impl AsRef<[u8]>) -> Option<Vec<u8>> {
        self.position(key.as_ref())
            .map(|index| self.entries.remove(index).1)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_slice(), value.as_slice()))
    }

    /// Parses raw header lines (line endings optional). Continuation lines
    /// starting with a space or tab are folded onto the previous line;
    /// continuations with nothing before them are dropped.
    pub fn parse_lines<L: AsRef<[u8]>>(lines: &[L]) -> HttpResult<Self> {
        let mut logical: Vec<Vec<u8>> = Vec::with_capacity(lines.len());

        for line in lines {
            let line = strip_line_ending(line.as_ref());
            if line.is_empty() {
                continue;
            }

            if matches!(line[0], b' ' | b'\t') {
                if let Some(previous) = logical.last_mut() {
                    previous.push(b' ');
                    previous.extend_from_slice(line.trim_ascii());
                }
                continue;
            }

            logical.push(line.to_vec());
        }

        let mut fields = Self::new();
        for line in logical {
            let Some(colon) = line.iter().position(|byte| *byte == b':') else {
                return Err(HttpError::InvalidHeaderLine(
                    String::from_utf8_lossy(&line).into_owned(),
                ));
            };

            let name = line[..colon].trim_ascii();
            let value = line[colon + 1..].trim_ascii();
            fields.set(name, value);
        }

        Ok(fields)
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, value) in &self.entries {
            out.extend_from_slice(name);
            out.extend_from_slice(b": ");
            out.extend_from_slice(value);
            out.extend_from_slice(b"\r\n");
        }
        out
    }
}

pub(crate) fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
