//! Request submission on top of the correlation engine.

use std::sync::Arc;

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use tether_mtproto::Dialer;
use tether_rpc::{InvocationError, Request, RpcError};
use tether_tl::{Deserializable, Serializable, enums, functions, types};

use crate::ConnInner;

impl<D: Dialer> ConnInner<D> {
    /// Wrap `body` in `gzip_packed` when it exceeds the threshold.
    fn pack(&self, body: &[u8]) -> Result<Vec<u8>, InvocationError> {
        let threshold = self.opts.compress_threshold;
        if threshold == 0 || body.len() <= threshold {
            return Ok(body.to_vec());
        }
        let packed = types::GzipPacked::compress(body)?;
        tracing::trace!(plain = body.len(), packed = packed.packed_data.len(), "[tether] compressed request");
        Ok(packed.to_bytes())
    }

    /// Send one content message and wait for its raw result.
    ///
    /// An "incorrect server salt" rejection is absorbed: the new salt is
    /// stored and the identical request is sent once more.
    pub(crate) async fn invoke_raw(&self, cancel: &CancellationToken, body: &[u8]) -> Result<Vec<u8>, InvocationError> {
        let body = self.pack(body)?;
        let (msg_id, seq_no) = self.next_msg_seq(true);
        let req = Request { msg_id, seq_no, body: Arc::from(body) };
        tracing::debug!(msg_id, "[tether] invoke");

        match self.engine.do_request(cancel, req.clone()).await {
            Err(InvocationError::BadMessage(bad)) if bad.is_bad_salt() => {
                if let Some(salt) = bad.new_salt {
                    self.store_salt(salt);
                }
                self.salts.reset();
                tracing::debug!(msg_id, "[tether] retrying request with new salt");
                self.engine.do_request(cancel, req).await
            }
            other => other,
        }
    }

    /// Ask the server to discard the answer to `req`.
    pub(crate) async fn drop_rpc(&self, req: Request) -> Result<(), InvocationError> {
        let call = functions::RpcDropAnswer { req_msg_id: req.msg_id };
        tracing::debug!(msg_id = req.msg_id, "[tether] dropping request");

        let payload = timeout(self.opts.request_timeout, self.invoke_raw(&CancellationToken::new(), &call.to_bytes()))
            .await
            .map_err(|_| InvocationError::Timeout("rpc_drop_answer"))??;

        match enums::RpcDropAnswer::from_bytes(&payload)? {
            enums::RpcDropAnswer::Dropped(_) | enums::RpcDropAnswer::DroppedRunning => Ok(()),
            enums::RpcDropAnswer::Unknown => Err(RpcError::from_message(0, "RPC_ANSWER_UNKNOWN").into()),
        }
    }
}
