//! Serde helpers for `http::Uri`, which has no serde support of its own.
//!
//! Use with `#[serde(with = "region_api::uri_serde")]`.

use http::Uri;
use serde::{de, Deserialize, Deserializer, Serializer};

pub fn serialize<S>(uri: &Uri, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(uri)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Uri, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_endpoint(&raw).map_err(de::Error::custom)
}

/// Parse an absolute endpoint URI. Scheme and authority are both required.
pub fn parse_endpoint(raw: &str) -> Result<Uri, String> {
    let uri: Uri = raw
        .trim()
        .parse()
        .map_err(|e| format!("invalid endpoint URI '{}': {}", raw, e))?;

    if uri.scheme().is_none() || uri.authority().is_none() {
        return Err(format!(
            "endpoint URI '{}' must include a scheme and host",
            raw
        ));
    }

    Ok(uri)
}

/// Serde helpers for a list of URIs
pub mod seq {
    use super::parse_endpoint;
    use http::Uri;
    use serde::{de, ser::SerializeSeq, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(uris: &[Uri], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(uris.len()))?;
        for uri in uris {
            seq.serialize_element(&uri.to_string())?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Uri>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Vec::<String>::deserialize(deserializer)?;
        raw.iter()
            .map(|s| parse_endpoint(s).map_err(de::Error::custom))
            .collect()
    }
}
