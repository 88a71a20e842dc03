//! Message identifiers.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Who produced a message, encoded in the two low bits of its id.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MessageType {
    /// `0b00`: sent by the client.
    Client,
    /// `0b01`: server reply to a client message.
    ServerResponse,
    /// `0b11`: sent by the server on its own initiative.
    FromServer,
    /// `0b10`: not a valid origin.
    Unknown,
}

impl MessageType {
    fn bits(self) -> i64 {
        match self {
            Self::Client         => 0,
            Self::ServerResponse => 1,
            Self::Unknown        => 2,
            Self::FromServer     => 3,
        }
    }

    /// True for the two server-side origins.
    pub fn is_server(self) -> bool {
        matches!(self, Self::ServerResponse | Self::FromServer)
    }
}

/// A 64-bit MTProto message identifier.
///
/// The upper 32 bits are Unix seconds, the lower 32 bits the sub-second
/// nanoseconds with the two lowest bits replaced by the [`MessageType`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MessageId(pub i64);

impl MessageId {
    /// Build an id for `now` with the given origin.
    pub fn new(now: SystemTime, kind: MessageType) -> Self {
        let since = now.duration_since(UNIX_EPOCH).unwrap_or_default();
        let secs  = since.as_secs() as i64;
        let nanos = i64::from(since.subsec_nanos());
        Self((secs << 32) | (nanos & !3) | kind.bits())
    }

    /// The origin encoded in the low bits.
    pub fn kind(self) -> MessageType {
        match self.0 & 3 {
            0 => MessageType::Client,
            1 => MessageType::ServerResponse,
            3 => MessageType::FromServer,
            _ => MessageType::Unknown,
        }
    }

    /// The wall-clock time the id was generated at.
    pub fn time(self) -> SystemTime {
        let secs  = (self.0 >> 32) as u64;
        let nanos = (self.0 & 0xffff_fffc) as u32;
        UNIX_EPOCH + Duration::new(secs, nanos.min(999_999_999))
    }

    /// Whether [`time`](Self::time) lies within `[now - max_past, now + max_future]`.
    pub fn within(self, now: SystemTime, max_past: Duration, max_future: Duration) -> bool {
        let t = self.time();
        match t.duration_since(now) {
            Ok(ahead) => ahead <= max_future,
            Err(behind) => behind.duration() <= max_past,
        }
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Produces strictly increasing client message ids.
///
/// Two ids generated within the same clock tick (or after the clock went
/// backwards) are separated by 4, which keeps the origin bits intact.
#[derive(Debug, Default)]
pub struct MessageIdGen {
    last: i64,
}

impl MessageIdGen {
    pub fn new() -> Self { Self::default() }

    /// Next client id at `now`.
    pub fn next(&mut self, now: SystemTime) -> MessageId {
        let mut id = MessageId::new(now, MessageType::Client).0;
        if id <= self.last {
            id = self.last + 4;
        }
        self.last = id;
        MessageId(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_low_bits() {
        let now = UNIX_EPOCH + Duration::new(1_700_000_000, 123_456_789);
        for kind in [MessageType::Client, MessageType::ServerResponse, MessageType::FromServer] {
            assert_eq!(MessageId::new(now, kind).kind(), kind);
        }
    }

    #[test]
    fn time_is_recoverable() {
        let now = UNIX_EPOCH + Duration::new(1_700_000_000, 500_000_000);
        let id = MessageId::new(now, MessageType::Client);
        assert_eq!(id.time(), now);
    }

    #[test]
    fn generator_is_monotonic_on_frozen_clock() {
        let now = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let mut g = MessageIdGen::new();
        let a = g.next(now);
        let b = g.next(now);
        let c = g.next(now - Duration::from_secs(5));
        assert_eq!(b.0, a.0 + 4);
        assert_eq!(c.0, b.0 + 4);
        assert_eq!(c.kind(), MessageType::Client);
    }

    #[test]
    fn window_bounds() {
        let now = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let past = Duration::from_secs(300);
        let future = Duration::from_secs(30);
        let id = |t| MessageId::new(t, MessageType::FromServer);

        assert!(id(now).within(now, past, future));
        assert!(id(now + Duration::from_secs(29)).within(now, past, future));
        assert!(!id(now + Duration::from_secs(31)).within(now, past, future));
        assert!(!id(now - Duration::from_secs(301)).within(now, past, future));
    }
}
