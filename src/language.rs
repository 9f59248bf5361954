//! Translation tables for `##key##` markup.
//!
//! A [`Language`] is a named key-to-text table loadable from two formats: an
//! XML document (`<language id="names" lang="en"><entry id="key">text</entry>
//! </language>`) and a flat `key=value` file where `#` and `;` start comment
//! lines. It plugs into the renderer as an opaque dataset value under the
//! reserved `"#"` root key, exposing the [`Lexicon`] capability.

use std::fmt;
use std::fs;
use std::path::Path;

use parking_lot::RwLock;
use quick_xml::events::Event;
use quick_xml::Reader;
use rustc_hash::FxHashMap;

use crate::error::LanguageError;
use crate::value::{Lexicon, OpaqueValue};

/// A translation table: entry ids mapped to display text.
///
/// Entries sit behind a lock so a table shared with running renders can still
/// be updated. The name and language code are fixed at load time.
#[derive(Debug, Default)]
pub struct Language {
    name: String,
    code: String,
    entries: RwLock<FxHashMap<String, String>>,
}

impl Language {
    /// Create an empty table with a name and an ISO language code.
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            entries: RwLock::default(),
        }
    }

    /// Parse an XML language document.
    pub fn from_xml_str(data: &str) -> Result<Language, LanguageError> {
        let mut lang = Language::default();
        let mut reader = Reader::from_str(data);
        reader.config_mut().trim_text(true);

        // id of the <entry> currently open, if any
        let mut open_entry: Option<String> = None;
        loop {
            match reader.read_event()? {
                Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"language" => {
                    for attr in e.attributes().flatten() {
                        let value = String::from_utf8_lossy(&attr.value).into_owned();
                        match attr.key.as_ref() {
                            b"id" => lang.name = value,
                            b"lang" => lang.code = value,
                            _ => {}
                        }
                    }
                }
                Event::Start(e) if e.name().as_ref() == b"entry" => {
                    if let Some(id) = entry_id(&e) {
                        lang.entries.write().insert(id.clone(), String::new());
                        open_entry = Some(id);
                    }
                }
                Event::Empty(e) if e.name().as_ref() == b"entry" => {
                    // an empty element is a present, empty entry
                    if let Some(id) = entry_id(&e) {
                        lang.entries.write().insert(id, String::new());
                    }
                }
                Event::Text(t) => {
                    if let Some(id) = &open_entry {
                        let text = decode_entities(&String::from_utf8_lossy(&t));
                        lang.entries.write().insert(id.clone(), text);
                    }
                }
                Event::End(e) => {
                    if e.name().as_ref() == b"entry" {
                        open_entry = None;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(lang)
    }

    /// Load and parse an XML language file.
    pub fn from_xml_file(path: impl AsRef<Path>) -> Result<Language, LanguageError> {
        let path = path.as_ref();
        let data =
            fs::read_to_string(path).map_err(|e| LanguageError::Io(path.to_path_buf(), e))?;
        Self::from_xml_str(&data)
    }

    /// Parse a flat `key=value` table.
    ///
    /// Empty lines, lines starting with `#` or `;`, lines without `=` and
    /// lines with an empty key are skipped. Keys and values are trimmed.
    /// Nothing in this format can fail, malformed lines just drop out.
    pub fn from_flat_str(data: &str) -> Language {
        let lang = Language::default();
        {
            let mut entries = lang.entries.write();
            for line in data.lines() {
                if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                    continue;
                }
                let Some((key, value)) = line.split_once('=') else {
                    continue;
                };
                let key = key.trim();
                if key.is_empty() {
                    continue;
                }
                entries.insert(key.to_owned(), value.trim().to_owned());
            }
        }
        lang
    }

    /// Load and parse a flat `key=value` file.
    pub fn from_flat_file(path: impl AsRef<Path>) -> Result<Language, LanguageError> {
        let path = path.as_ref();
        let data =
            fs::read_to_string(path).map_err(|e| LanguageError::Io(path.to_path_buf(), e))?;
        Ok(Self::from_flat_str(&data))
    }

    /// The table name (the XML `id` attribute).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The ISO language code (the XML `lang` attribute).
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Add or replace an entry.
    pub fn set(&self, entry: impl Into<String>, value: impl Into<String>) {
        self.entries.write().insert(entry.into(), value.into());
    }

    /// Remove an entry.
    pub fn del(&self, entry: &str) {
        self.entries.write().remove(entry);
    }

    /// A copy of all entries.
    pub fn entries(&self) -> FxHashMap<String, String> {
        self.entries.read().clone()
    }
}

impl Lexicon for Language {
    fn get(&self, key: &str) -> String {
        self.entries.read().get(key).cloned().unwrap_or_default()
    }
}

impl OpaqueValue for Language {
    fn format(&self) -> String {
        self.to_string()
    }

    fn as_lexicon(&self) -> Option<&dyn Lexicon> {
        Some(self)
    }
}

impl fmt::Display for Language {
    /// Deterministic (sorted) dump, same shape as the dataset one.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.read();
        let mut parts: Vec<String> = entries.iter().map(|(k, v)| format!("{k}:{v}")).collect();
        parts.sort();
        write!(f, "Language{{{}}}", parts.join(" "))
    }
}

/// The `id` attribute of an `<entry>` element.
fn entry_id(e: &quick_xml::events::BytesStart<'_>) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"id")
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// Decode the five predefined XML entities in entry text.
fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<language id="messages" lang="en">
  <entry id="greeting">Hello</entry>
  <entry id="farewell">Goodbye &amp; good luck</entry>
  <entry id="empty"/>
</language>"#;

    #[test]
    fn test_from_xml_str() {
        let lang = Language::from_xml_str(XML).unwrap();
        assert_eq!(lang.name(), "messages");
        assert_eq!(lang.code(), "en");
        assert_eq!(lang.get("greeting"), "Hello");
        assert_eq!(lang.get("farewell"), "Goodbye & good luck");
        assert_eq!(lang.get("empty"), "");
        assert_eq!(lang.entries().len(), 3);
    }

    #[test]
    fn test_from_xml_str_rejects_malformed() {
        assert!(Language::from_xml_str("<language><entry").is_err());
    }

    #[test]
    fn test_from_flat_str_skips_junk_lines() {
        let lang = Language::from_flat_str(
            "# a comment\n; another\ngreeting = Hello \nnot a pair\n=nokey\n\nfarewell=Bye",
        );
        assert_eq!(lang.get("greeting"), "Hello");
        assert_eq!(lang.get("farewell"), "Bye");
        assert_eq!(lang.entries().len(), 2);
    }

    #[test]
    fn test_missing_entry_is_empty_string() {
        let lang = Language::new("t", "en");
        assert_eq!(lang.get("anything"), "");
    }

    #[test]
    fn test_set_and_del() {
        let lang = Language::new("t", "en");
        lang.set("k", "v");
        assert_eq!(lang.get("k"), "v");
        lang.set("k", "v2");
        assert_eq!(lang.get("k"), "v2");
        lang.del("k");
        assert_eq!(lang.get("k"), "");
    }

    #[test]
    fn test_from_files() {
        let dir = tempfile::tempdir().unwrap();

        let xml_path = dir.path().join("messages.xml");
        let mut f = std::fs::File::create(&xml_path).unwrap();
        f.write_all(XML.as_bytes()).unwrap();
        let lang = Language::from_xml_file(&xml_path).unwrap();
        assert_eq!(lang.get("greeting"), "Hello");

        let flat_path = dir.path().join("messages.lang");
        let mut f = std::fs::File::create(&flat_path).unwrap();
        f.write_all(b"greeting=Hola\n").unwrap();
        let lang = Language::from_flat_file(&flat_path).unwrap();
        assert_eq!(lang.get("greeting"), "Hola");
    }

    #[test]
    fn test_from_missing_file_reports_path() {
        let err = Language::from_xml_file("/no/such/file.xml").unwrap_err();
        assert!(err.to_string().contains("/no/such/file.xml"));
    }

    #[test]
    fn test_display_is_sorted() {
        let lang = Language::new("t", "en");
        lang.set("b", "2");
        lang.set("a", "1");
        assert_eq!(lang.to_string(), "Language{a:1 b:2}");
    }

    #[test]
    fn test_opaque_capability_probe() {
        let lang = Language::from_flat_str("k=v");
        let value = crate::Value::opaque(lang);
        let opaque = value.as_opaque().unwrap();
        let lexicon = opaque.as_lexicon().unwrap();
        assert_eq!(lexicon.get("k"), "v");
    }
}
