pub mod chat;
pub mod config;
pub mod peer;
pub mod rtc;
pub mod signaling;
pub mod transport;
