//! Wire Protocol Types
//!
//! One request per datagram: byte 0 is the action tag, the rest is the UTF-8
//! payload. Replies are bare UTF-8 text; an empty reply means either "no
//! result" or "acknowledged".

use std::fmt;

use thiserror::Error;

/// Largest datagram the listener will read
pub const MAX_DATAGRAM: usize = 64 * 1024;

/// Request kind, carried in the first byte of a datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Action {
    /// Liveness probe, answered with an empty reply
    Check = 1,
    /// Fetch the proof named by the payload, bypassing the queue
    Request = 2,
    /// Take the next prefetched proof
    Random = 3,
    /// Acknowledge, then shut the daemon down
    Kill = 4,
}

impl Action {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Result<Self, ProtocolError> {
        match tag {
            1 => Ok(Self::Check),
            2 => Ok(Self::Request),
            3 => Ok(Self::Random),
            4 => Ok(Self::Kill),
            other => Err(ProtocolError::UnknownAction(other)),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Check => "check",
            Self::Request => "request",
            Self::Random => "random",
            Self::Kill => "kill",
        };
        f.write_str(name)
    }
}

/// Errors decoding an inbound datagram
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Empty datagram")]
    Empty,
    #[error("Unknown action tag {0}")]
    UnknownAction(u8),
    #[error("Payload is not valid UTF-8")]
    InvalidUtf8,
}

/// A request datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub action: Action,
    pub payload: String,
}

impl Message {
    pub fn new(action: Action, payload: impl Into<String>) -> Self {
        Self {
            action,
            payload: payload.into(),
        }
    }

    pub fn check() -> Self {
        Self::new(Action::Check, "")
    }

    pub fn request(name: impl Into<String>) -> Self {
        Self::new(Action::Request, name)
    }

    pub fn random() -> Self {
        Self::new(Action::Random, "")
    }

    pub fn kill() -> Self {
        Self::new(Action::Kill, "")
    }

    /// Encode as `tag || payload`
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + self.payload.len());
        buf.push(self.action.tag());
        buf.extend_from_slice(self.payload.as_bytes());
        buf
    }

    /// Decode a received datagram
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let (&tag, payload) = data.split_first().ok_or(ProtocolError::Empty)?;
        let action = Action::from_tag(tag)?;
        let payload = std::str::from_utf8(payload).map_err(|_| ProtocolError::InvalidUtf8)?;
        Ok(Self::new(action, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_round_trip() {
        let messages = [
            Message::check(),
            Message::random(),
            Message::kill(),
            Message::request("Euclid's Lemma"),
            Message::request("Pythagoras's Theorem/Proof 2 ∎"),
        ];
        for msg in messages {
            assert_eq!(Message::decode(&msg.encode()).unwrap(), msg);
        }
    }

    #[test]
    fn test_wire_layout() {
        assert_eq!(Message::request("ab").encode(), vec![2, b'a', b'b']);
        assert_eq!(Message::check().encode(), vec![1]);
        assert_eq!(Message::kill().encode(), vec![4]);
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(Message::decode(&[]), Err(ProtocolError::Empty));
        assert_eq!(Message::decode(&[0]), Err(ProtocolError::UnknownAction(0)));
        assert_eq!(Message::decode(&[9, b'x']), Err(ProtocolError::UnknownAction(9)));
        assert_eq!(Message::decode(&[2, 0xff, 0xfe]), Err(ProtocolError::InvalidUtf8));
    }
}
