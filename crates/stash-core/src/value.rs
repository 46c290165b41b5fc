use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// A logical value held by the store.
///
/// Raw strings are kept apart from structured data: `Text` is written to the
/// backend verbatim, `Json` is written as JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Json(serde_json::Value),
}

impl Value {
    /// Structured value from anything serde can serialize.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Value::Json)
    }

    /// Try to read `text` as JSON, falling back to the raw string.
    ///
    /// This is the read-side policy of the store: malformed or plain text is
    /// never an error.
    pub fn parse_or_raw(text: String) -> Self {
        match serde_json::from_str(&text) {
            Ok(json) => Value::Json(json),
            Err(_) => Value::Text(text),
        }
    }

    /// Text form written to a backend.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        match self {
            Value::Text(text) => Ok(text.clone()),
            Value::Json(json) => serde_json::to_string(json),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            Value::Json(serde_json::Value::String(text)) => Some(text),
            Value::Json(_) => None,
        }
    }

    /// JSON view of the value; raw text becomes a JSON string.
    pub fn into_json(self) -> serde_json::Value {
        match self {
            Value::Text(text) => serde_json::Value::String(text),
            Value::Json(json) => json,
        }
    }

    /// Convert into a caller type. No validation beyond what serde needs.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.into_json())
    }

    /// Decode stored text into a caller type.
    ///
    /// Text is read as JSON first; when that does not fit `T` it is offered
    /// as a plain JSON string, so `"42"` still decodes into a `String`.
    pub fn decode_text<T: DeserializeOwned>(text: String) -> Result<T, serde_json::Error> {
        match serde_json::from_str(&text) {
            Ok(decoded) => Ok(decoded),
            Err(err) => serde_json::from_value(serde_json::Value::String(text)).map_err(|_| err),
        }
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::Json(json)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_or_raw_prefers_json() {
        assert_eq!(
            Value::parse_or_raw(r#"{"id":1}"#.into()),
            Value::Json(json!({"id": 1}))
        );
        assert_eq!(Value::parse_or_raw("42".into()), Value::Json(json!(42)));
    }

    #[test]
    fn parse_or_raw_falls_back_to_text() {
        assert_eq!(
            Value::parse_or_raw("hello world".into()),
            Value::Text("hello world".into())
        );
        assert_eq!(
            Value::parse_or_raw("{broken".into()),
            Value::Text("{broken".into())
        );
    }

    #[test]
    fn text_is_written_verbatim_and_json_as_json() {
        assert_eq!(Value::from("plain").to_text().unwrap(), "plain");
        assert_eq!(
            Value::from(json!({"a": [1, 2]})).to_text().unwrap(),
            r#"{"a":[1,2]}"#
        );
    }

    #[test]
    fn decodes_into_caller_types() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct User {
            id: u32,
            name: String,
        }

        let value = Value::from(json!({"id": 1, "name": "Ann"}));
        let user: User = value.decode().expect("decode");
        assert_eq!(
            user,
            User {
                id: 1,
                name: "Ann".into()
            }
        );

        let text: String = Value::from("raw").decode().expect("decode text");
        assert_eq!(text, "raw");
    }

    #[test]
    fn decode_text_falls_back_to_the_raw_string() {
        for raw in ["42", "true", "null", "hello"] {
            let text: String = Value::decode_text(raw.into()).expect("decode as string");
            assert_eq!(text, raw);
        }
        let quoted: String = Value::decode_text(r#""quoted""#.into()).expect("decode");
        assert_eq!(quoted, "quoted");

        let number: u32 = Value::decode_text("42".into()).expect("decode number");
        assert_eq!(number, 42);
        assert!(Value::decode_text::<u32>("forty-two".into()).is_err());
    }
}
