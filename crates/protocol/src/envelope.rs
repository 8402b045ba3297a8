//! JSON envelope carried inside every frame.
//!
//! ```text
//! {"type":1,"Metadata":{"file_name":"a.txt","file_size":3,"file_hash":"..."}}
//! {"type":2,"Metadata":null,"data":"AAEC"}
//! {"type":3,"Metadata":null,"error":"failed to read file"}
//! {"type":4,"Metadata":null}
//! ```
//!
//! Field names and omission rules match the original Go peer, so either side
//! can talk to the other: `Metadata` is always present (null when unused),
//! `data` (standard base64) and `error` are omitted when empty.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::ProtocolError;
use crate::messages::{FileMetadata, Message, MessageKind};

/// Owned wire shape of a frame payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(rename = "Metadata", default)]
    pub metadata: Option<FileMetadata>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "base64_bytes")]
    pub data: Vec<u8>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl TryFrom<Envelope> for Message {
    type Error = ProtocolError;

    fn try_from(env: Envelope) -> Result<Self, ProtocolError> {
        match MessageKind::from_u8(env.kind) {
            Some(MessageKind::Metadata) => env.metadata.map(Message::Metadata).ok_or_else(|| {
                ProtocolError::Decode("metadata frame without metadata".into())
            }),
            Some(MessageKind::Chunk) => Ok(Message::Chunk(env.data)),
            Some(MessageKind::Error) => Ok(Message::Error(env.error)),
            Some(MessageKind::Done) => Ok(Message::Done),
            None => Err(ProtocolError::Decode(format!(
                "unknown message type {}",
                env.kind
            ))),
        }
    }
}

/// Borrowed wire shape, so chunks can be encoded without copying the buffer first.
#[derive(Serialize)]
struct EnvelopeRef<'a> {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(rename = "Metadata")]
    metadata: Option<&'a FileMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Base64Slice<'a>>,
    #[serde(skip_serializing_if = "str::is_empty")]
    error: &'a str,
}

struct Base64Slice<'a>(&'a [u8]);

impl Serialize for Base64Slice<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(self.0))
    }
}

impl<'a> EnvelopeRef<'a> {
    fn empty(kind: MessageKind) -> Self {
        Self {
            kind: kind.as_u8(),
            metadata: None,
            data: None,
            error: "",
        }
    }

    fn from_message(message: &'a Message) -> Self {
        match message {
            Message::Metadata(meta) => Self {
                metadata: Some(meta),
                ..Self::empty(MessageKind::Metadata)
            },
            Message::Chunk(data) => Self::chunk(data),
            Message::Error(error) => Self {
                error,
                ..Self::empty(MessageKind::Error)
            },
            Message::Done => Self::empty(MessageKind::Done),
        }
    }

    fn chunk(data: &'a [u8]) -> Self {
        Self {
            data: (!data.is_empty()).then_some(Base64Slice(data)),
            ..Self::empty(MessageKind::Chunk)
        }
    }

    fn to_vec(&self) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }
}

/// Encodes a message into a frame payload.
pub(crate) fn encode(message: &Message) -> Result<Vec<u8>, ProtocolError> {
    EnvelopeRef::from_message(message).to_vec()
}

/// Encodes a chunk payload straight from a borrowed buffer.
pub(crate) fn encode_chunk(data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    EnvelopeRef::chunk(data).to_vec()
}

/// Decodes a frame payload into a message.
pub(crate) fn decode(payload: &[u8]) -> Result<Message, ProtocolError> {
    let env: Envelope =
        serde_json::from_slice(payload).map_err(|e| ProtocolError::Decode(e.to_string()))?;
    Message::try_from(env)
}

mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(data).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}
