//! Boxed types with more than one constructor.

use crate::deserialize::{Buffer, Error, Result};
use crate::{Deserializable, Identifiable, Serializable, types};

/// `RpcDropAnswer`: the server's reply to `rpc_drop_answer`.
#[derive(Clone, Debug, PartialEq)]
pub enum RpcDropAnswer {
    /// The server never saw the request (or already forgot it).
    Unknown,
    /// The request was still running and has been told to stop.
    DroppedRunning,
    /// The answer was already produced and has been discarded.
    Dropped(types::RpcAnswerDropped),
}

impl Serializable for RpcDropAnswer {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        match self {
            Self::Unknown        => types::RpcAnswerUnknown {}.serialize(buf),
            Self::DroppedRunning => types::RpcAnswerDroppedRunning {}.serialize(buf),
            Self::Dropped(d)     => d.serialize(buf),
        }
    }
}

impl Deserializable for RpcDropAnswer {
    fn deserialize(buf: Buffer) -> Result<Self> {
        match buf.peek_id()? {
            types::RpcAnswerUnknown::CONSTRUCTOR_ID => {
                types::RpcAnswerUnknown::deserialize(buf).map(|_| Self::Unknown)
            }
            types::RpcAnswerDroppedRunning::CONSTRUCTOR_ID => {
                types::RpcAnswerDroppedRunning::deserialize(buf).map(|_| Self::DroppedRunning)
            }
            types::RpcAnswerDropped::CONSTRUCTOR_ID => {
                types::RpcAnswerDropped::deserialize(buf).map(Self::Dropped)
            }
            id => Err(Error::UnexpectedConstructor { id }),
        }
    }
}
