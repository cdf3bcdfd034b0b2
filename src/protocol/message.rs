use std::fmt;

use serde::{Serialize, Deserialize};
use crate::core::ClientId;

/// Message-kind tag
///
/// Only the bootstrap descriptors are interpreted by this crate. Every other
/// value belongs to the application and is carried untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Descriptor(pub i32);

impl Descriptor {
    /// A node announcing its id; `meta_data` carries a [`HelloFlag`]
    pub const IDENTIFY: Descriptor = Descriptor(1);
    /// A node relaying a third party's address: `meta_data` is the octet, `value` the id
    pub const CLIENT_INFO: Descriptor = Descriptor(5);
    /// Coordinator asking every node to restart; `value` is the reason
    pub const SYSTEM_RESTART: Descriptor = Descriptor(77);
    /// Unrecoverable failure on the sending node; `value` is the reason
    pub const SYSTEM_FAILURE: Descriptor = Descriptor(99);

    /// Returns the raw wire value
    pub fn get(&self) -> i32 {
        self.0
    }

    /// Returns whether this crate reserves the descriptor
    pub fn is_reserved(&self) -> bool {
        matches!(
            *self,
            Descriptor::IDENTIFY
                | Descriptor::CLIENT_INFO
                | Descriptor::SYSTEM_RESTART
                | Descriptor::SYSTEM_FAILURE
        )
    }
}

impl From<i32> for Descriptor {
    fn from(code: i32) -> Self {
        Descriptor(code)
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Descriptor::IDENTIFY => write!(f, "identify"),
            Descriptor::CLIENT_INFO => write!(f, "client-info"),
            Descriptor::SYSTEM_RESTART => write!(f, "system-restart"),
            Descriptor::SYSTEM_FAILURE => write!(f, "system-failure"),
            Descriptor(code) => write!(f, "{}", code),
        }
    }
}

/// Value of `meta_data` on an identify message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelloFlag {
    /// Plain announcement, no answer expected
    Announce = 0,
    /// Greeting; the receiver answers with a reply
    Greeting = 1,
    /// Answer to a greeting
    Reply = 2,
}

impl HelloFlag {
    /// Interprets an identify message's `meta_data`
    pub fn from_meta(meta_data: i32) -> Option<Self> {
        match meta_data {
            0 => Some(HelloFlag::Announce),
            1 => Some(HelloFlag::Greeting),
            2 => Some(HelloFlag::Reply),
            _ => None,
        }
    }
}

/// The unit of communication between nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Sender's id
    pub from: ClientId,
    /// Recipient's id, or [`ClientId::BROADCAST`]
    pub to: ClientId,
    /// Kind of message
    pub descriptor: Descriptor,
    /// Descriptor-dependent payload
    pub meta_data: i32,
    /// Descriptor-dependent payload
    pub value: i32,
}

impl Message {
    /// Creates a new message
    pub fn new(
        from: ClientId,
        to: ClientId,
        descriptor: Descriptor,
        meta_data: i32,
        value: i32,
    ) -> Self {
        Message {
            from,
            to,
            descriptor,
            meta_data,
            value,
        }
    }

    /// Returns whether this message is meant for `local`
    pub fn is_addressed_to(&self, local: ClientId) -> bool {
        self.to == local || self.to.is_broadcast()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} [{}] meta={} value={}",
            self.from, self.to, self.descriptor, self.meta_data, self.value
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_addressing() {
        let local = ClientId(2);
        let direct = Message::new(ClientId(3), local, Descriptor(10), 0, 0);
        let broadcast = Message::new(ClientId(3), ClientId::BROADCAST, Descriptor(10), 0, 0);
        let other = Message::new(ClientId(3), ClientId(4), Descriptor(10), 0, 0);

        assert!(direct.is_addressed_to(local));
        assert!(broadcast.is_addressed_to(local));
        assert!(!other.is_addressed_to(local));
    }

    #[test]
    fn test_reserved_descriptors() {
        assert!(Descriptor::IDENTIFY.is_reserved());
        assert!(Descriptor::CLIENT_INFO.is_reserved());
        assert!(!Descriptor(30).is_reserved());
        assert_ne!(Descriptor::IDENTIFY, Descriptor::CLIENT_INFO);
    }

    #[test]
    fn test_hello_flag() {
        assert_eq!(HelloFlag::from_meta(1), Some(HelloFlag::Greeting));
        assert_eq!(HelloFlag::from_meta(2), Some(HelloFlag::Reply));
        assert_eq!(HelloFlag::from_meta(7), None);
        assert_eq!(HelloFlag::Greeting as i32, 1);
    }

    #[test]
    fn test_message_display() {
        let message = Message::new(ClientId(3), ClientId(0), Descriptor::IDENTIFY, 1, 3);
        assert_eq!(message.to_string(), "3 -> 0 [identify] meta=1 value=3");
    }
}
