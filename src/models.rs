use serde::{Deserialize, Serialize};

/// One raw document returned by the search endpoint.
///
/// The shape is owned by the search backend; it is passed through to the
/// prompt verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchHit(pub serde_json::Value);

/// Outcome of a search request. Empty results are reported separately so
/// callers can skip the model call.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Empty,
    Hits(Vec<SearchHit>),
}

/// Kind of document a record summarizes.
///
/// Matching is case-insensitive; any other label is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecordType {
    Conversation,
    Product,
    Other(String),
}

impl From<String> for RecordType {
    fn from(label: String) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "conversation" => Self::Conversation,
            "product" => Self::Product,
            _ => Self::Other(label),
        }
    }
}

impl From<RecordType> for String {
    fn from(kind: RecordType) -> Self {
        match kind {
            RecordType::Conversation => "conversation".to_string(),
            RecordType::Product => "product".to_string(),
            RecordType::Other(label) => label,
        }
    }
}

/// An advisor or a client referenced by a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Party {
    #[serde(default, deserialize_with = "lenient::text")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: String,
}

impl From<String> for Party {
    fn from(name: String) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductRef {
    #[serde(default, deserialize_with = "lenient::text")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(default, rename = "type", deserialize_with = "lenient::text")]
    pub kind: String,
}

impl From<String> for ProductRef {
    fn from(name: String) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }
}

/// A single summarized document as produced by the model.
///
/// Models are loose with scalars, so every field accepts any JSON value:
/// numbers and booleans become their text, `null` becomes empty, and a bare
/// string in place of a nested object is taken as its name. Only the
/// presence of `summary` is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(
        default,
        rename = "type",
        deserialize_with = "lenient::record_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub record_type: Option<RecordType>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient::nested")]
    pub advisor: Party,
    #[serde(default, deserialize_with = "lenient::nested")]
    pub client: Party,
    #[serde(default, deserialize_with = "lenient::nested")]
    pub product: ProductRef,
    #[serde(deserialize_with = "lenient::text")]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient::texts")]
    pub topics: Vec<String>,
    #[serde(default, deserialize_with = "lenient::texts")]
    pub actions: Vec<String>,
    #[serde(
        default,
        rename = "rawText",
        deserialize_with = "lenient::optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub raw_text: Option<String>,
}

mod lenient {
    use serde::de::{DeserializeOwned, Error};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::RecordType;

    fn to_text(value: Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s,
            other => other.to_string(),
        }
    }

    pub fn text<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
        Value::deserialize(de).map(to_text)
    }

    pub fn optional_text<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(de)? {
            Value::Null => None,
            other => Some(to_text(other)),
        })
    }

    pub fn texts<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(de)? {
            Value::Null => Vec::new(),
            Value::Array(items) => items
                .into_iter()
                .filter(|item| !item.is_null())
                .map(to_text)
                .collect(),
            other => vec![to_text(other)],
        })
    }

    pub fn record_type<'de, D: Deserializer<'de>>(de: D) -> Result<Option<RecordType>, D::Error> {
        Ok(match Value::deserialize(de)? {
            Value::Null => None,
            other => Some(RecordType::from(to_text(other))),
        })
    }

    pub fn nested<'de, D, T>(de: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default + From<String>,
    {
        match Value::deserialize(de)? {
            Value::Object(map) => {
                serde_json::from_value(Value::Object(map)).map_err(D::Error::custom)
            }
            Value::Null => Ok(T::default()),
            other => Ok(T::from(to_text(other))),
        }
    }
}

/// Text accumulated from one completion stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamState {
    pub accumulated_text: String,
    pub is_stream_finished: bool,
}

impl StreamState {
    pub fn push_chunk(&mut self, chunk: &str) {
        self.accumulated_text.push_str(chunk);
    }

    pub fn finish(&mut self) {
        self.is_stream_finished = true;
    }
}

/// Summarize request
#[derive(Debug, Clone, Deserialize)]
pub struct SummarizeRequest {
    pub query: String,
    /// Queries sharing a session id supersede each other
    pub session_id: Option<String>,
}
