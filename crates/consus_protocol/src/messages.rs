//! Protocol messages for the transaction session.
//!
//! Each message encodes to a CBOR map keyed by text field names. Tables,
//! keys and values travel as CBOR byte strings so that opaque bytes are
//! never reinterpreted.

use crate::error::{ProtocolError, ProtocolResult};
use crate::ids::TransactionId;
use crate::returncode::ReturnCode;
use ciborium::value::{Integer, Value};

/// A request from a client to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Start a new transaction.
    Begin {
        /// Session the transaction belongs to (for store-side logging).
        session: [u8; 16],
    },
    /// Read a key inside a transaction.
    Get {
        /// Transaction ID.
        txid: TransactionId,
        /// Position of the operation within the transaction.
        slot: u64,
        /// Table name.
        table: Vec<u8>,
        /// Key.
        key: Vec<u8>,
    },
    /// Write a key inside a transaction.
    Put {
        /// Transaction ID.
        txid: TransactionId,
        /// Position of the operation within the transaction.
        slot: u64,
        /// Table name.
        table: Vec<u8>,
        /// Key.
        key: Vec<u8>,
        /// Value to write.
        value: Vec<u8>,
    },
    /// Commit a transaction.
    Commit {
        /// Transaction ID.
        txid: TransactionId,
        /// Position of the operation within the transaction.
        slot: u64,
    },
    /// Abort a transaction.
    Abort {
        /// Transaction ID.
        txid: TransactionId,
        /// Position of the operation within the transaction.
        slot: u64,
    },
}

impl Request {
    /// Returns the wire name of the request type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Request::Begin { .. } => "begin",
            Request::Get { .. } => "get",
            Request::Put { .. } => "put",
            Request::Commit { .. } => "commit",
            Request::Abort { .. } => "abort",
        }
    }

    /// Returns the transaction this request addresses, if any.
    pub fn txid(&self) -> Option<TransactionId> {
        match self {
            Request::Begin { .. } => None,
            Request::Get { txid, .. }
            | Request::Put { txid, .. }
            | Request::Commit { txid, .. }
            | Request::Abort { txid, .. } => Some(*txid),
        }
    }
}

/// A request together with the nonce the client uses to match its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEnvelope {
    /// Client-chosen nonce, echoed in the response.
    pub nonce: u64,
    /// The request itself.
    pub request: Request,
}

impl RequestEnvelope {
    /// Creates a new envelope.
    pub fn new(nonce: u64, request: Request) -> Self {
        Self { nonce, request }
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        let mut pairs = vec![
            field("type", Value::Text(self.request.type_name().into())),
            field("nonce", uint(self.nonce)),
        ];

        match &self.request {
            Request::Begin { session } => {
                pairs.push(field("session", Value::Bytes(session.to_vec())));
            }
            Request::Get {
                txid,
                slot,
                table,
                key,
            } => {
                pairs.push(field("txid", encode_txid(txid)));
                pairs.push(field("slot", uint(*slot)));
                pairs.push(field("table", Value::Bytes(table.clone())));
                pairs.push(field("key", Value::Bytes(key.clone())));
            }
            Request::Put {
                txid,
                slot,
                table,
                key,
                value,
            } => {
                pairs.push(field("txid", encode_txid(txid)));
                pairs.push(field("slot", uint(*slot)));
                pairs.push(field("table", Value::Bytes(table.clone())));
                pairs.push(field("key", Value::Bytes(key.clone())));
                pairs.push(field("value", Value::Bytes(value.clone())));
            }
            Request::Commit { txid, slot } | Request::Abort { txid, slot } => {
                pairs.push(field("txid", encode_txid(txid)));
                pairs.push(field("slot", uint(*slot)));
            }
        }

        to_cbor(&Value::Map(pairs))
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        let value = from_cbor(bytes)?;
        let fields = Fields::new(&value)?;

        let nonce = fields.uint("nonce")?;
        let request = match fields.text("type")? {
            "begin" => {
                let session: [u8; 16] = fields
                    .bytes("session")?
                    .try_into()
                    .map_err(|_| ProtocolError::invalid_structure("session must be 16 bytes"))?;
                Request::Begin { session }
            }
            "get" => Request::Get {
                txid: fields.txid("txid")?,
                slot: fields.uint("slot")?,
                table: fields.bytes("table")?,
                key: fields.bytes("key")?,
            },
            "put" => Request::Put {
                txid: fields.txid("txid")?,
                slot: fields.uint("slot")?,
                table: fields.bytes("table")?,
                key: fields.bytes("key")?,
                value: fields.bytes("value")?,
            },
            "commit" => Request::Commit {
                txid: fields.txid("txid")?,
                slot: fields.uint("slot")?,
            },
            "abort" => Request::Abort {
                txid: fields.txid("txid")?,
                slot: fields.uint("slot")?,
            },
            other => return Err(ProtocolError::UnknownMessageType(other.to_string())),
        };

        Ok(Self { nonce, request })
    }
}

/// A response from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Nonce of the request this answers.
    pub nonce: u64,
    /// Outcome of the request.
    pub code: ReturnCode,
    /// Transaction ID assigned by a begin request.
    pub txid: Option<TransactionId>,
    /// Value returned by a get request.
    pub value: Option<Vec<u8>>,
    /// Human-readable detail for failures.
    pub message: Option<String>,
}

impl Response {
    /// Creates a plain success response.
    pub fn success(nonce: u64) -> Self {
        Self {
            nonce,
            code: ReturnCode::Success,
            txid: None,
            value: None,
            message: None,
        }
    }

    /// Creates the response to a successful begin.
    pub fn begun(nonce: u64, txid: TransactionId) -> Self {
        Self {
            txid: Some(txid),
            ..Self::success(nonce)
        }
    }

    /// Creates the response to a get; `None` reports the key as absent.
    pub fn value(nonce: u64, value: Option<Vec<u8>>) -> Self {
        match value {
            Some(v) => Self {
                value: Some(v),
                ..Self::success(nonce)
            },
            None => Self {
                code: ReturnCode::NotFound,
                ..Self::success(nonce)
            },
        }
    }

    /// Creates an error response.
    pub fn error(nonce: u64, code: ReturnCode, message: impl Into<String>) -> Self {
        Self {
            nonce,
            code,
            txid: None,
            value: None,
            message: Some(message.into()),
        }
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        let mut pairs = vec![
            field("nonce", uint(self.nonce)),
            field("code", uint(u64::from(self.code.to_code()))),
        ];

        if let Some(ref txid) = self.txid {
            pairs.push(field("txid", encode_txid(txid)));
        }
        if let Some(ref value) = self.value {
            pairs.push(field("value", Value::Bytes(value.clone())));
        }
        if let Some(ref message) = self.message {
            pairs.push(field("message", Value::Text(message.clone())));
        }

        to_cbor(&Value::Map(pairs))
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        let value = from_cbor(bytes)?;
        let fields = Fields::new(&value)?;

        let code = u16::try_from(fields.uint("code")?)
            .map(ReturnCode::from_code)
            .unwrap_or(ReturnCode::Garbage);

        let txid = match fields.get("txid") {
            Some(v) => Some(decode_txid(v)?),
            None => None,
        };

        let value = match fields.get("value") {
            Some(v) => Some(
                v.as_bytes()
                    .cloned()
                    .ok_or_else(|| ProtocolError::invalid_structure("value must be bytes"))?,
            ),
            None => None,
        };

        let message = fields
            .get("message")
            .and_then(|v| v.as_text())
            .map(|s| s.to_string());

        Ok(Self {
            nonce: fields.uint("nonce")?,
            code,
            txid,
            value,
            message,
        })
    }
}

fn field(name: &str, value: Value) -> (Value, Value) {
    (Value::Text(name.into()), value)
}

fn uint(n: u64) -> Value {
    Value::Integer(Integer::from(n))
}

fn encode_txid(txid: &TransactionId) -> Value {
    Value::Array(vec![uint(txid.start), uint(txid.number)])
}

fn decode_txid(value: &Value) -> ProtocolResult<TransactionId> {
    let parts = value
        .as_array()
        .ok_or_else(|| ProtocolError::invalid_structure("txid must be an array"))?;
    match parts.as_slice() {
        [start, number] => Ok(TransactionId::new(as_u64(start)?, as_u64(number)?)),
        _ => Err(ProtocolError::invalid_structure(
            "txid must have two elements",
        )),
    }
}

fn as_u64(value: &Value) -> ProtocolResult<u64> {
    value
        .as_integer()
        .and_then(|i| u64::try_from(i).ok())
        .ok_or_else(|| ProtocolError::invalid_structure("expected unsigned integer"))
}

fn to_cbor(value: &Value) -> ProtocolResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf)
        .map_err(|e| ProtocolError::encoding_failed(e.to_string()))?;
    Ok(buf)
}

fn from_cbor(bytes: &[u8]) -> ProtocolResult<Value> {
    ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::decoding_failed(e.to_string()))
}

/// Field lookup over a decoded CBOR map.
struct Fields<'a> {
    pairs: &'a [(Value, Value)],
}

impl<'a> Fields<'a> {
    fn new(value: &'a Value) -> ProtocolResult<Self> {
        let pairs = value
            .as_map()
            .ok_or_else(|| ProtocolError::invalid_structure("expected map"))?;
        Ok(Self { pairs })
    }

    fn get(&self, name: &str) -> Option<&'a Value> {
        self.pairs
            .iter()
            .find(|(k, _)| k.as_text() == Some(name))
            .map(|(_, v)| v)
    }

    fn require(&self, name: &str) -> ProtocolResult<&'a Value> {
        self.get(name)
            .ok_or_else(|| ProtocolError::invalid_structure(format!("missing {name}")))
    }

    fn uint(&self, name: &str) -> ProtocolResult<u64> {
        as_u64(self.require(name)?)
            .map_err(|_| ProtocolError::invalid_structure(format!("{name} must be unsigned")))
    }

    fn text(&self, name: &str) -> ProtocolResult<&'a str> {
        self.require(name)?
            .as_text()
            .ok_or_else(|| ProtocolError::invalid_structure(format!("{name} must be text")))
    }

    fn bytes(&self, name: &str) -> ProtocolResult<Vec<u8>> {
        self.require(name)?
            .as_bytes()
            .cloned()
            .ok_or_else(|| ProtocolError::invalid_structure(format!("{name} must be bytes")))
    }

    fn txid(&self, name: &str) -> ProtocolResult<TransactionId> {
        decode_txid(self.require(name)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txid() -> TransactionId {
        TransactionId::new(1_000, 42)
    }

    #[test]
    fn begin_roundtrip() {
        let env = RequestEnvelope::new(7, Request::Begin { session: [9u8; 16] });
        let decoded = RequestEnvelope::decode(&env.encode().unwrap()).unwrap();
        assert_eq!(decoded, env);
    }

    #[test]
    fn put_keeps_opaque_bytes() {
        let env = RequestEnvelope::new(
            8,
            Request::Put {
                txid: txid(),
                slot: 3,
                table: b"the table".to_vec(),
                key: vec![0x00, 0xff, 0x80],
                value: vec![],
            },
        );
        let decoded = RequestEnvelope::decode(&env.encode().unwrap()).unwrap();
        assert_eq!(decoded, env);
    }

    #[test]
    fn commit_carries_slot() {
        let env = RequestEnvelope::new(1, Request::Commit { txid: txid(), slot: 12 });
        let decoded = RequestEnvelope::decode(&env.encode().unwrap()).unwrap();
        match decoded.request {
            Request::Commit { txid: t, slot } => {
                assert_eq!(t, txid());
                assert_eq!(slot, 12);
            }
            other => panic!("expected commit, got {other:?}"),
        }
    }

    #[test]
    fn unknown_type_rejected() {
        let bytes = to_cbor(&Value::Map(vec![
            field("type", Value::Text("restart".into())),
            field("nonce", uint(1)),
        ]))
        .unwrap();
        let err = RequestEnvelope::decode(&bytes).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownMessageType("restart".into()));
    }

    #[test]
    fn missing_field_rejected() {
        let bytes = to_cbor(&Value::Map(vec![
            field("type", Value::Text("get".into())),
            field("nonce", uint(1)),
            field("txid", encode_txid(&txid())),
            field("slot", uint(1)),
            field("table", Value::Bytes(b"t".to_vec())),
        ]))
        .unwrap();
        assert!(matches!(
            RequestEnvelope::decode(&bytes),
            Err(ProtocolError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn text_key_is_not_bytes() {
        let bytes = to_cbor(&Value::Map(vec![
            field("type", Value::Text("get".into())),
            field("nonce", uint(1)),
            field("txid", encode_txid(&txid())),
            field("slot", uint(1)),
            field("table", Value::Bytes(b"t".to_vec())),
            field("key", Value::Text("k".into())),
        ]))
        .unwrap();
        assert!(RequestEnvelope::decode(&bytes).is_err());
    }

    #[test]
    fn garbage_bytes_rejected() {
        assert!(RequestEnvelope::decode(&[0xff, 0x00, 0x13]).is_err());
        assert!(Response::decode(&[]).is_err());
    }

    #[test]
    fn response_absent_value() {
        let resp = Response::value(5, None);
        assert_eq!(resp.code, ReturnCode::NotFound);
        let decoded = Response::decode(&resp.encode().unwrap()).unwrap();
        assert_eq!(decoded.code, ReturnCode::NotFound);
        assert!(decoded.value.is_none());
    }

    #[test]
    fn response_empty_value_is_present() {
        let resp = Response::value(5, Some(vec![]));
        let decoded = Response::decode(&resp.encode().unwrap()).unwrap();
        assert_eq!(decoded.code, ReturnCode::Success);
        assert_eq!(decoded.value, Some(vec![]));
    }

    #[test]
    fn response_begun_and_error() {
        let decoded = Response::decode(&Response::begun(2, txid()).encode().unwrap()).unwrap();
        assert_eq!(decoded.txid, Some(txid()));

        let err = Response::error(3, ReturnCode::Aborted, "wounded");
        let decoded = Response::decode(&err.encode().unwrap()).unwrap();
        assert_eq!(decoded.code, ReturnCode::Aborted);
        assert_eq!(decoded.message.as_deref(), Some("wounded"));
        assert_eq!(decoded.nonce, 3);
    }

    #[test]
    fn unknown_response_code_is_garbage() {
        let bytes = to_cbor(&Value::Map(vec![
            field("nonce", uint(1)),
            field("code", uint(99_999)),
        ]))
        .unwrap();
        assert_eq!(Response::decode(&bytes).unwrap().code, ReturnCode::Garbage);
    }
}
