//! Session identity and outbound sequencing.

use std::time::SystemTime;

use tether_crypto::AuthKey;

use crate::message::{MessageId, MessageIdGen};

/// The `(auth_key, session_id, salt)` triple every encrypted frame carries.
///
/// `auth_key` is `None` until a key exchange completes or a stored key is
/// loaded; a `session_id` of `0` means "pick a fresh random one on connect".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Session {
    pub auth_key: Option<AuthKey>,
    pub id:       i64,
    pub salt:     i64,
}

impl Session {
    pub fn new(auth_key: Option<AuthKey>, id: i64, salt: i64) -> Self {
        Self { auth_key, id, salt }
    }

    /// Whether a non-zero key is present.
    pub fn has_key(&self) -> bool {
        self.auth_key.is_some()
    }
}

/// Draw a random non-zero session id.
pub fn random_session_id() -> Result<i64, getrandom::Error> {
    loop {
        let mut rnd = [0u8; 8];
        getrandom::getrandom(&mut rnd)?;
        let id = i64::from_le_bytes(rnd);
        if id != 0 {
            return Ok(id);
        }
    }
}

/// Allocates `(msg_id, seq_no)` pairs.
///
/// `seq_no` is twice the number of content messages sent so far, plus one
/// for a content message (which also advances the count). Service messages
/// get an even number and leave the count untouched.
///
/// ```rust
/// use std::time::SystemTime;
/// use tether_mtproto::Sequencer;
///
/// let mut seq = Sequencer::new();
/// let now = SystemTime::now();
/// assert_eq!(seq.next(now, false).1, 0);
/// assert_eq!(seq.next(now, true).1, 1);
/// assert_eq!(seq.next(now, false).1, 2);
/// assert_eq!(seq.next(now, true).1, 3);
/// ```
#[derive(Debug, Default)]
pub struct Sequencer {
    ids:          MessageIdGen,
    sent_content: i32,
}

impl Sequencer {
    pub fn new() -> Self { Self::default() }

    pub fn next(&mut self, now: SystemTime, content: bool) -> (MessageId, i32) {
        let id = self.ids.next(now);
        let mut seq_no = self.sent_content * 2;
        if content {
            seq_no += 1;
            self.sent_content += 1;
        }
        (id, seq_no)
    }

    /// Forget the content counter; used when the server starts a new session.
    pub fn reset(&mut self) {
        self.sent_content = 0;
    }
}
