//! Protocol implementation module
//!
//! This module defines the protocol messages, their fixed-width
//! encoding, and the timed state machine nodes use to gate behaviour.

pub mod codec;
pub mod message;
pub mod state;

pub use self::codec::{decode, encode, MessageCodec};
pub use self::message::{Descriptor, HelloFlag, Message};
pub use self::state::{StateMachine, TransitionHandler};
