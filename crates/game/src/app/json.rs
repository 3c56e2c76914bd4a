use serde::de::DeserializeOwned;
use thiserror::Error;

/// JSON decode failure with the path of the offending field, when there is
/// one.
#[derive(Debug, Error)]
#[error("parse {document} json{location}: {source}")]
pub(crate) struct JsonError {
    document: &'static str,
    location: String,
    #[source]
    source: serde_json::Error,
}

pub(crate) fn parse_json<T: DeserializeOwned>(
    document: &'static str,
    raw: &str,
) -> Result<T, JsonError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, T>(&mut deserializer).map_err(|error| {
        let path = error.path().to_string();
        let source = error.into_inner();
        let location = if path.is_empty() || path == "." {
            String::new()
        } else {
            format!(" at {path}")
        };
        JsonError {
            document,
            location,
            source,
        }
    })
}
