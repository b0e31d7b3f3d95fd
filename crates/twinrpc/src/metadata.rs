use std::{collections::HashMap, convert::TryFrom};

use http::{
    header::{self, HeaderName},
    HeaderMap, HeaderValue,
};

use crate::{Status, TWINRPC_HEADER_PREFIX};

/// Headers that belong to the transport and never surface as metadata.
const RESERVED_HEADERS: [HeaderName; 13] = [
    header::CONTENT_TYPE,
    header::DATE,
    header::CONTENT_LENGTH,
    header::HOST,
    header::USER_AGENT,
    header::ACCEPT,
    header::ACCEPT_ENCODING,
    header::TE,
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
];

/// Returns whether a header name is reserved by a transport.
pub fn is_reserved(name: &HeaderName) -> bool {
    RESERVED_HEADERS.contains(name) || name.as_str().starts_with(TWINRPC_HEADER_PREFIX)
}

/// Out-of-band key / value metadata of a call.
///
/// Keys are case-insensitive and stored lowercase; a key may carry several
/// values, in which case [`MetadataMap::get`] returns the first one. Values
/// must be visible ASCII.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataMap {
    headers: HeaderMap,
}

impl MetadataMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build inbound metadata from transport headers, dropping reserved ones
    /// and values that aren't visible ASCII.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut map = Self::new();
        for (name, value) in headers {
            if is_reserved(name) {
                continue;
            }
            if value.to_str().is_err() {
                tracing::debug!("dropping metadata header {}: value is not visible ASCII", name);
                continue;
            }
            map.headers.append(name.clone(), value.clone());
        }
        map
    }

    /// Borrow the underlying header map.
    pub fn as_headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Convert this map into a header map.
    pub fn into_headers(self) -> HeaderMap {
        self.headers
    }

    /// Insert a value, replacing every previous value of the key.
    pub fn insert(&mut self, key: &str, value: &str) -> Result<(), Status> {
        let (name, value) = parse_pair(key, value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Append a value to the key, keeping previous values.
    pub fn append(&mut self, key: &str, value: &str) -> Result<(), Status> {
        let (name, value) = parse_pair(key, value)?;
        self.headers.append(name, value);
        Ok(())
    }

    /// First value of a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(|v| v.to_str().ok())
    }

    /// First value of a key, only if `key` is spelled exactly as stored, that
    /// is lowercase.
    pub fn get_exact(&self, key: &str) -> Option<&str> {
        if key.bytes().any(|b| b.is_ascii_uppercase()) {
            return None;
        }
        self.get(key)
    }

    /// Every value of a key, in insertion order.
    pub fn get_all<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .get_all(key)
            .into_iter()
            .filter_map(|v| v.to_str().ok())
    }

    /// Remove a key, returning its first value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.headers
            .remove(key)
            .and_then(|v| v.to_str().ok().map(ToOwned::to_owned))
    }

    /// Iterate over every key / value pair, repeating keys with several values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str(), v)))
    }

    /// Number of values stored.
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Whether the map holds no values.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Append every value of `other` to this map.
    pub fn merge(&mut self, other: MetadataMap) {
        let mut last = None;
        for (name, value) in other.headers {
            // `HeaderMap`'s owning iterator only yields the name for the first value
            let name = match name {
                Some(name) => {
                    last = Some(name.clone());
                    name
                }
                None => match &last {
                    Some(name) => name.clone(),
                    None => continue,
                },
            };
            self.headers.append(name, value);
        }
    }
}

fn parse_pair(key: &str, value: &str) -> Result<(HeaderName, HeaderValue), Status> {
    let name = HeaderName::from_bytes(key.as_bytes())
        .map_err(|_| Status::invalid_argument(format!("invalid metadata key {:?}", key)))?;
    if is_reserved(&name) {
        return Err(Status::invalid_argument(format!(
            "metadata key {:?} is reserved",
            key
        )));
    }
    let invalid_value =
        || Status::invalid_argument(format!("invalid value for metadata key {:?}", key));
    let value = HeaderValue::from_str(value).map_err(|_| invalid_value())?;
    // `HeaderValue` takes opaque bytes that `to_str` would hide later
    if value.to_str().is_err() {
        return Err(invalid_value());
    }
    Ok((name, value))
}

impl TryFrom<HashMap<String, String>> for MetadataMap {
    type Error = Status;

    fn try_from(pairs: HashMap<String, String>) -> Result<Self, Self::Error> {
        let mut map = MetadataMap::new();
        // sort so the produced header order doesn't depend on hashing
        let mut pairs: Vec<_> = pairs.into_iter().collect();
        pairs.sort();
        for (key, value) in pairs {
            map.insert(&key, &value)?;
        }
        Ok(map)
    }
}

impl<'a> TryFrom<&'a [(&'a str, &'a str)]> for MetadataMap {
    type Error = Status;

    fn try_from(pairs: &'a [(&'a str, &'a str)]) -> Result<Self, Self::Error> {
        let mut map = MetadataMap::new();
        for (key, value) in pairs {
            map.append(key, value)?;
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Code;

    #[test]
    fn first_value_wins() {
        let mut map = MetadataMap::new();
        map.append("code", "1234").unwrap();
        map.append("code", "5678").unwrap();

        assert_eq!(map.get("code"), Some("1234"));
        assert_eq!(map.get("CODE"), Some("1234"));
        assert_eq!(map.get_all("code").collect::<Vec<_>>(), ["1234", "5678"]);
        assert_eq!(map.len(), 2);

        assert_eq!(map.get_exact("code"), Some("1234"));
        assert_eq!(map.get_exact("Code"), None);
        assert_eq!(map.get_exact("no such key"), None);

        map.insert("code", "0").unwrap();
        assert_eq!(map.get_all("code").collect::<Vec<_>>(), ["0"]);
    }

    #[test]
    fn rejects_invalid_and_reserved_keys() {
        let mut map = MetadataMap::new();
        let err = map.insert("bad key", "v").unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
        let err = map.insert("content-type", "v").unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
        let err = map.insert("twinrpc-status", "0").unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
        let err = map.insert("k", "line\nbreak").unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
        assert!(map.is_empty());
    }

    #[test]
    fn rejects_values_that_are_not_visible_ascii() {
        let mut map = MetadataMap::new();
        let err = map.append("k", "h\u{e9}llo").unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
        let err = map.insert("k", "\u{1F600}").unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
        assert!(map.is_empty());

        let mut pairs = HashMap::new();
        pairs.insert("k".to_string(), "h\u{e9}llo".to_string());
        assert!(MetadataMap::try_from(pairs).is_err());

        map.append("k", "tab\tand spaces ~").unwrap();
        assert_eq!(map.get("k"), Some("tab\tand spaces ~"));
    }

    #[test]
    fn from_headers_drops_transport_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("x"));
        headers.insert(header::HOST, HeaderValue::from_static("localhost"));
        headers.insert("twinrpc-version", HeaderValue::from_static("1"));
        headers.insert("a", HeaderValue::from_static("1"));
        headers.append("b", HeaderValue::from_static("2"));
        headers.append("b", HeaderValue::from_static("3"));
        headers.insert("c", HeaderValue::from_bytes(b"h\xe9llo").unwrap());

        let map = MetadataMap::from_headers(&headers);
        let pairs: Vec<_> = map.iter().collect();
        assert_eq!(pairs, [("a", "1"), ("b", "2"), ("b", "3")]);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn merge_keeps_multiple_values() {
        let mut left = MetadataMap::try_from(&[("a", "1")][..]).unwrap();
        let right = MetadataMap::try_from(&[("b", "2"), ("b", "3"), ("a", "4")][..]).unwrap();
        left.merge(right);

        assert_eq!(left.get_all("a").collect::<Vec<_>>(), ["1", "4"]);
        assert_eq!(left.get_all("b").collect::<Vec<_>>(), ["2", "3"]);
    }

    #[test]
    fn from_hash_map() {
        let mut pairs = HashMap::new();
        pairs.insert("code".to_string(), "1234".to_string());
        pairs.insert("b".to_string(), "2".to_string());
        let map = MetadataMap::try_from(pairs).unwrap();
        assert_eq!(map.get("code"), Some("1234"));
        assert_eq!(map.get("b"), Some("2"));

        let mut bad = HashMap::new();
        bad.insert("no spaces".to_string(), "x".to_string());
        assert!(MetadataMap::try_from(bad).is_err());
    }
}
