//! Service calls from `mtproto.tl`.
//!
//! These also implement [`Deserializable`](crate::Deserializable) so that
//! test servers can decode what the client sent.

use crate::{RemoteCall, enums, types};

tl_boxed! {
    /// `ping#7abe77ec ping_id:long = Pong`
    Ping = 0x7abe77ec {
        ping_id: i64,
    }
}

impl RemoteCall for Ping {
    type Return = types::Pong;
}

tl_boxed! {
    /// `ping_delay_disconnect#f3427b8c ping_id:long disconnect_delay:int = Pong`
    ///
    /// Asks the server to close the connection if no further ping arrives
    /// within `disconnect_delay` seconds.
    PingDelayDisconnect = 0xf3427b8c {
        ping_id:          i64,
        disconnect_delay: i32,
    }
}

impl RemoteCall for PingDelayDisconnect {
    type Return = types::Pong;
}

tl_boxed! {
    /// `get_future_salts#b921bd04 num:int = FutureSalts`
    GetFutureSalts = 0xb921bd04 {
        num: i32,
    }
}

impl RemoteCall for GetFutureSalts {
    type Return = types::FutureSalts;
}

tl_boxed! {
    /// `rpc_drop_answer#58e4a740 req_msg_id:long = RpcDropAnswer`
    RpcDropAnswer = 0x58e4a740 {
        req_msg_id: i64,
    }
}

impl RemoteCall for RpcDropAnswer {
    type Return = enums::RpcDropAnswer;
}
