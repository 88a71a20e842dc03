//! Service-message constructors from `mtproto.tl`.
//!
//! Boxed constructors write and check their constructor ID. The two bare
//! types ([`FutureSalt`] and [`ContainerMessage`]) only ever appear inside
//! bare vectors and carry no ID on the wire.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::GzEncoder;

use crate::deserialize::{Buffer, Error, Result};
use crate::{Deserializable, Identifiable, RawVec, Serializable, expect_id};

// ─── RPC replies ──────────────────────────────────────────────────────────────

/// `rpc_result#f35c6d01 req_msg_id:long result:Object = RpcResult`
///
/// `result` holds the raw, still-encoded inner object.
#[derive(Clone, Debug, PartialEq)]
pub struct RpcResult {
    pub req_msg_id: i64,
    pub result:     Vec<u8>,
}

impl Identifiable for RpcResult {
    const CONSTRUCTOR_ID: u32 = 0xf35c6d01;
}

impl Serializable for RpcResult {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        Self::CONSTRUCTOR_ID.serialize(buf);
        self.req_msg_id.serialize(buf);
        buf.extend(self.result.iter().copied());
    }
}

impl Deserializable for RpcResult {
    fn deserialize(buf: Buffer) -> Result<Self> {
        expect_id::<Self>(buf)?;
        let req_msg_id = i64::deserialize(buf)?;
        let mut result = Vec::new();
        buf.read_to_end(&mut result);
        Ok(Self { req_msg_id, result })
    }
}

tl_boxed! {
    /// `rpc_error#2144ca19 error_code:int error_message:string = RpcError`
    RpcError = 0x2144ca19 {
        error_code:    i32,
        error_message: String,
    }
}

tl_boxed! {
    /// `msgs_ack#62d6b459 msg_ids:Vector<long> = MsgsAck`
    MsgsAck = 0x62d6b459 {
        msg_ids: Vec<i64>,
    }
}

tl_boxed! {
    /// `pong#347773c5 msg_id:long ping_id:long = Pong`
    Pong = 0x347773c5 {
        msg_id:  i64,
        ping_id: i64,
    }
}

// ─── Session notifications ────────────────────────────────────────────────────

tl_boxed! {
    /// `new_session_created#9ec20908 first_msg_id:long unique_id:long server_salt:long`
    NewSessionCreated = 0x9ec20908 {
        first_msg_id: i64,
        unique_id:    i64,
        server_salt:  i64,
    }
}

tl_boxed! {
    /// `bad_msg_notification#a7eff811 bad_msg_id:long bad_msg_seqno:int error_code:int`
    BadMsgNotification = 0xa7eff811 {
        bad_msg_id:    i64,
        bad_msg_seqno: i32,
        error_code:    i32,
    }
}

tl_boxed! {
    /// `bad_server_salt#edab447b bad_msg_id:long bad_msg_seqno:int error_code:int new_server_salt:long`
    BadServerSalt = 0xedab447b {
        bad_msg_id:      i64,
        bad_msg_seqno:   i32,
        error_code:      i32,
        new_server_salt: i64,
    }
}

tl_boxed! {
    /// `msg_detailed_info#276d3ec6 msg_id:long answer_msg_id:long bytes:int status:int`
    MsgDetailedInfo = 0x276d3ec6 {
        msg_id:        i64,
        answer_msg_id: i64,
        bytes:         i32,
        status:        i32,
    }
}

tl_boxed! {
    /// `msg_new_detailed_info#809db6df answer_msg_id:long bytes:int status:int`
    MsgNewDetailedInfo = 0x809db6df {
        answer_msg_id: i64,
        bytes:         i32,
        status:        i32,
    }
}

// ─── Salts ────────────────────────────────────────────────────────────────────

/// `future_salt#0949d9dc valid_since:int valid_until:int salt:long` (bare)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FutureSalt {
    pub valid_since: i32,
    pub valid_until: i32,
    pub salt:        i64,
}

impl Identifiable for FutureSalt {
    const CONSTRUCTOR_ID: u32 = 0x0949d9dc;
}

impl Serializable for FutureSalt {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        self.valid_since.serialize(buf);
        self.valid_until.serialize(buf);
        self.salt.serialize(buf);
    }
}

impl Deserializable for FutureSalt {
    fn deserialize(buf: Buffer) -> Result<Self> {
        Ok(Self {
            valid_since: i32::deserialize(buf)?,
            valid_until: i32::deserialize(buf)?,
            salt:        i64::deserialize(buf)?,
        })
    }
}

tl_boxed! {
    /// `future_salts#ae500895 req_msg_id:long now:int salts:vector<future_salt>`
    FutureSalts = 0xae500895 {
        req_msg_id: i64,
        now:        i32,
        salts:      RawVec<FutureSalt>,
    }
}

// ─── Drop answers ─────────────────────────────────────────────────────────────

tl_boxed! {
    /// `rpc_answer_unknown#5e2ad36e = RpcDropAnswer`
    RpcAnswerUnknown = 0x5e2ad36e {}
}

tl_boxed! {
    /// `rpc_answer_dropped_running#cd78e586 = RpcDropAnswer`
    RpcAnswerDroppedRunning = 0xcd78e586 {}
}

tl_boxed! {
    /// `rpc_answer_dropped#a43ad8b7 msg_id:long seq_no:int bytes:int = RpcDropAnswer`
    RpcAnswerDropped = 0xa43ad8b7 {
        msg_id: i64,
        seq_no: i32,
        bytes:  i32,
    }
}

// ─── Containers ───────────────────────────────────────────────────────────────

/// One `message msg_id:long seqno:int bytes:int body:Object` inside a
/// container (bare).
#[derive(Clone, Debug, PartialEq)]
pub struct ContainerMessage {
    pub msg_id: i64,
    pub seq_no: i32,
    pub body:   Vec<u8>,
}

impl Serializable for ContainerMessage {
    fn serialize(&self, buf: &mut impl Extend<u8>) {
        self.msg_id.serialize(buf);
        self.seq_no.serialize(buf);
        (self.body.len() as i32).serialize(buf);
        buf.extend(self.body.iter().copied());
    }
}

impl Deserializable for ContainerMessage {
    fn deserialize(buf: Buffer) -> Result<Self> {
        let msg_id = i64::deserialize(buf)?;
        let seq_no = i32::deserialize(buf)?;
        let len    = i32::deserialize(buf)?;
        if len < 0 {
            return Err(Error::InvalidLength { len: i64::from(len) });
        }
        let body = buf.read_slice(len as usize)?.to_vec();
        Ok(Self { msg_id, seq_no, body })
    }
}

tl_boxed! {
    /// `msg_container#73f1f8dc messages:vector<%Message> = MessageContainer`
    MsgContainer = 0x73f1f8dc {
        messages: RawVec<ContainerMessage>,
    }
}

// ─── Compression ──────────────────────────────────────────────────────────────

tl_boxed! {
    /// `gzip_packed#3072cfa1 packed_data:string = Object`
    GzipPacked = 0x3072cfa1 {
        packed_data: Vec<u8>,
    }
}

impl GzipPacked {
    /// Compress `body` into a new wrapper.
    pub fn compress(body: &[u8]) -> std::io::Result<Self> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(body)?;
        Ok(Self { packed_data: enc.finish()? })
    }

    /// Inflate the packed data.
    ///
    /// Gzip is what the server sends; a bare zlib stream is accepted too.
    pub fn decompress(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        if GzDecoder::new(self.packed_data.as_slice()).read_to_end(&mut out).is_ok() && !out.is_empty() {
            return Ok(out);
        }
        out.clear();
        ZlibDecoder::new(self.packed_data.as_slice())
            .read_to_end(&mut out)
            .map_err(|_| Error::Decompress)?;
        Ok(out)
    }
}
