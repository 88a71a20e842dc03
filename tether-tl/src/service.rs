//! Tag-peeking decoder for inbound message bodies.
//!
//! The reader hands every decrypted body to [`ServiceMessage::decode`]; the
//! result tells it which handler to route to. Bodies with an unrecognised
//! constructor are returned as [`ServiceMessage::Other`] so that callers
//! can pass them to the application untouched.

use crate::deserialize::{Result, peek_id};
use crate::{Deserializable, Identifiable, types};

/// An inbound body, classified by its leading constructor ID.
#[derive(Clone, Debug, PartialEq)]
pub enum ServiceMessage {
    RpcResult(types::RpcResult),
    MsgsAck(types::MsgsAck),
    NewSessionCreated(types::NewSessionCreated),
    BadMsgNotification(types::BadMsgNotification),
    BadServerSalt(types::BadServerSalt),
    FutureSalts(types::FutureSalts),
    Container(types::MsgContainer),
    GzipPacked(types::GzipPacked),
    Pong(types::Pong),
    /// `msg_detailed_info` or `msg_new_detailed_info`; carries nothing the
    /// session acts on.
    DetailedInfo,
    /// Anything else, identified by its constructor ID.
    Other(u32),
}

impl ServiceMessage {
    /// Classify and decode `body`.
    ///
    /// Fails only when the constructor is known but its fields are
    /// malformed, or when `body` is shorter than a constructor ID.
    pub fn decode(body: &[u8]) -> Result<Self> {
        let msg = match peek_id(body)? {
            types::RpcResult::CONSTRUCTOR_ID => Self::RpcResult(types::RpcResult::from_bytes(body)?),
            types::MsgsAck::CONSTRUCTOR_ID => Self::MsgsAck(types::MsgsAck::from_bytes(body)?),
            types::NewSessionCreated::CONSTRUCTOR_ID => {
                Self::NewSessionCreated(types::NewSessionCreated::from_bytes(body)?)
            }
            types::BadMsgNotification::CONSTRUCTOR_ID => {
                Self::BadMsgNotification(types::BadMsgNotification::from_bytes(body)?)
            }
            types::BadServerSalt::CONSTRUCTOR_ID => {
                Self::BadServerSalt(types::BadServerSalt::from_bytes(body)?)
            }
            types::FutureSalts::CONSTRUCTOR_ID => {
                Self::FutureSalts(types::FutureSalts::from_bytes(body)?)
            }
            types::MsgContainer::CONSTRUCTOR_ID => {
                Self::Container(types::MsgContainer::from_bytes(body)?)
            }
            types::GzipPacked::CONSTRUCTOR_ID => {
                Self::GzipPacked(types::GzipPacked::from_bytes(body)?)
            }
            types::Pong::CONSTRUCTOR_ID => Self::Pong(types::Pong::from_bytes(body)?),
            types::MsgDetailedInfo::CONSTRUCTOR_ID => {
                types::MsgDetailedInfo::from_bytes(body)?;
                Self::DetailedInfo
            }
            types::MsgNewDetailedInfo::CONSTRUCTOR_ID => {
                types::MsgNewDetailedInfo::from_bytes(body)?;
                Self::DetailedInfo
            }
            id => Self::Other(id),
        };
        Ok(msg)
    }
}

// ─── RPC answers ──────────────────────────────────────────────────────────────

/// What an `rpc_result` carried, once any gzip layer is removed.
#[derive(Clone, Debug, PartialEq)]
pub enum RpcAnswer {
    /// The server rejected the call.
    Error(types::RpcError),
    /// A `pong`, which may belong to a keepalive ping rather than a request.
    Pong(types::Pong),
    /// Any other result body, still encoded.
    Payload(Vec<u8>),
}

impl types::RpcResult {
    /// Unwrap the inner object.
    ///
    /// A `gzip_packed` result is inflated once and its constructor
    /// re-examined.
    pub fn answer(&self) -> Result<RpcAnswer> {
        let mut body = std::borrow::Cow::Borrowed(self.result.as_slice());
        if peek_id(&body)? == types::GzipPacked::CONSTRUCTOR_ID {
            let packed = types::GzipPacked::from_bytes(&body)?;
            body = std::borrow::Cow::Owned(packed.decompress()?);
        }

        match peek_id(&body)? {
            types::RpcError::CONSTRUCTOR_ID => {
                Ok(RpcAnswer::Error(types::RpcError::from_bytes(&body)?))
            }
            types::Pong::CONSTRUCTOR_ID => Ok(RpcAnswer::Pong(types::Pong::from_bytes(&body)?)),
            _ => Ok(RpcAnswer::Payload(body.into_owned())),
        }
    }
}

