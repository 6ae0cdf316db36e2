//! Insertion-ordered multimap used for query parameters and headers.

/// Ordered multimap. Keys keep their original spelling; header lookups use the
/// `*_ignore_case` variants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiValueMap {
    entries: Vec<(String, Vec<String>)>,
}

impl MultiValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value, creating the key if needed.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((key, vec![value])),
        }
    }

    /// Replace all values for a key (header keys compared case-insensitively).
    pub fn set_ignore_case(&mut self, key: impl Into<String>, values: Vec<String>) {
        let key = key.into();
        match self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
        {
            Some((_, existing)) => *existing = values,
            None => self.entries.push((key, values)),
        }
    }

    /// Replace all values for a key, exact key comparison.
    pub fn set(&mut self, key: impl Into<String>, values: Vec<String>) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = values,
            None => self.entries.push((key, values)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    pub fn get_ignore_case(&self, key: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_slice())
    }

    /// First value of a header, case-insensitive.
    pub fn first_ignore_case(&self, key: &str) -> Option<&str> {
        self.get_ignore_case(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn contains_key_ignore_case(&self, key: &str) -> bool {
        self.get_ignore_case(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse `a=1&a=2&b` into an ordered multimap, percent-decoding keys and values.
    pub fn from_query_string(query: &str) -> Self {
        let mut map = Self::new();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = match pair.split_once('=') {
                Some((k, v)) => (k, v),
                None => (pair, ""),
            };
            map.insert(decode_component(key), decode_component(value));
        }
        map
    }

    /// Render as a query string, percent-encoding keys and values.
    pub fn to_query_string(&self) -> String {
        self.entries
            .iter()
            .flat_map(|(k, values)| {
                values.iter().map(move |v| {
                    if v.is_empty() {
                        urlencoding::encode(k).into_owned()
                    } else {
                        format!("{}={}", urlencoding::encode(k), urlencoding::encode(v))
                    }
                })
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

impl<K, V> FromIterator<(K, V)> for MultiValueMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}
