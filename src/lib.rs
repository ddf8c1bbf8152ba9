//! # Fish Shop Telegram Bot
//!
//! A Telegram bot front-end for an e-commerce catalog: users browse
//! products, fill a per-user cart on the commerce backend and check out by
//! sending an email address. Conversation state lives in Redis.

pub mod bot;
pub mod circuit_breaker;
pub mod commerce;
pub mod config;
pub mod dialogue;
pub mod localization;
pub mod log_forwarder;
pub mod store;
