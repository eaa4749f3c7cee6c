//! Language-keyed strings and the ordered fallback used to pick one.

use serde::de::{self, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Result of a localized lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn or_else(self, f: impl FnOnce() -> Lookup<T>) -> Lookup<T> {
        match self {
            Lookup::Found(v) => Lookup::Found(v),
            Lookup::NotFound => f(),
        }
    }

    pub fn unwrap_or(self, fallback: T) -> T {
        match self {
            Lookup::Found(v) => v,
            Lookup::NotFound => fallback,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

/// Language code to text, in the order the upstream sent them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Localized(Vec<(String, String)>);

impl Localized {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, lang: impl Into<String>, text: impl Into<String>) {
        let lang = lang.into();
        let text = text.into();
        match self.0.iter_mut().find(|(l, _)| *l == lang) {
            Some(entry) => entry.1 = text,
            None => self.0.push((lang, text)),
        }
    }

    pub fn get(&self, lang: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(l, _)| l == lang)
            .map(|(_, t)| t.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First non-empty value in document order.
    pub fn first(&self) -> Lookup<&str> {
        self.0
            .iter()
            .map(|(_, t)| t.as_str())
            .find(|t| !t.is_empty())
            .map_or(Lookup::NotFound, Lookup::Found)
    }

    /// Only the languages named in `priority`, in priority order.
    pub fn preferred(&self, priority: &[&str]) -> Lookup<&str> {
        priority
            .iter()
            .filter_map(|lang| self.get(lang))
            .find(|t| !t.is_empty())
            .map_or(Lookup::NotFound, Lookup::Found)
    }

    /// Priority languages first, then whatever is available.
    pub fn lookup(&self, priority: &[&str]) -> Lookup<&str> {
        self.preferred(priority).or_else(|| self.first())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Localized {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut out = Localized::new();
        for (k, v) in iter {
            out.insert(k, v);
        }
        out
    }
}

impl Serialize for Localized {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

struct LocalizedVisitor;

impl<'de> Visitor<'de> for LocalizedVisitor {
    type Value = Localized;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of language codes to strings")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Localized, A::Error> {
        let mut out = Localized::new();
        while let Some((lang, text)) = map.next_entry::<String, Option<String>>()? {
            if let Some(text) = text {
                out.insert(lang, text);
            }
        }
        Ok(out)
    }

    // MangaDex encodes an empty map as `[]`.
    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Localized, A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(Localized::new())
    }

    fn visit_unit<E: de::Error>(self) -> Result<Localized, E> {
        Ok(Localized::new())
    }
}

impl<'de> Deserialize<'de> for Localized {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(LocalizedVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIORITY: &[&str] = &["en", "ja-ro", "ja"];

    #[test]
    fn priority_beats_document_order() {
        let titles: Localized = serde_json::from_str(r#"{"ko": "제목", "ja-ro": "Taitoru", "en": ""}"#).unwrap();
        assert_eq!(titles.lookup(PRIORITY), Lookup::Found("Taitoru"));
    }

    #[test]
    fn falls_back_to_first_available() {
        let titles: Localized = serde_json::from_str(r#"{"fr": "Titre", "de": "Titel"}"#).unwrap();
        assert_eq!(titles.preferred(PRIORITY), Lookup::NotFound);
        assert_eq!(titles.lookup(PRIORITY), Lookup::Found("Titre"));
    }

    #[test]
    fn empty_array_and_null_decode_as_empty() {
        let a: Localized = serde_json::from_str("[]").unwrap();
        let b: Localized = serde_json::from_str("null").unwrap();
        assert!(a.is_empty());
        assert!(b.is_empty());
        assert_eq!(a.lookup(PRIORITY), Lookup::NotFound);
    }

    #[test]
    fn serializes_back_to_a_map() {
        let titles: Localized = [("en", "One"), ("ja", "Ichi")].into_iter().collect();
        assert_eq!(serde_json::to_string(&titles).unwrap(), r#"{"en":"One","ja":"Ichi"}"#);
    }
}
