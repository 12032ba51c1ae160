use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::value::Value;

/// Connect timeout used when none is configured.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 1000;

/// Largest frame either side accepts.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(pub Uuid);

impl CallId {
    pub fn new() -> Self {
        CallId(Uuid::new_v4())
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum RpcRequest {
    Call {
        call_id: CallId,
        service: String,
        method: String,
        /// Positional; `None` is an omitted argument.
        args: Vec<Option<Value>>,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum RpcResponse {
    Result {
        call_id: CallId,
        value: Option<Value>,
    },
    Error {
        call_id: Option<CallId>,
        message: String,
    },
}

/// Binary body of one frame.
pub fn encode_frame<T: Serialize>(msg: &T) -> Result<Bytes> {
    serde_cbor::to_vec(msg)
        .map(Bytes::from)
        .map_err(|e| Error::Protocol(format!("cannot encode message: {e}")))
}

pub fn decode_frame<T: DeserializeOwned>(frame: &[u8]) -> Result<T> {
    serde_cbor::from_slice(frame).map_err(|e| Error::Protocol(format!("cannot decode message: {e}")))
}
