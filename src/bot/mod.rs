//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `controller`: The shop conversation state machine
//! - `message_handler`: Handles incoming text messages and commands
//! - `callback_handler`: Handles inline keyboard callback queries
//! - `sender`: Executes controller output against the Bot API
//! - `ui_builder`: Creates keyboards and formats messages

pub mod callback_handler;
pub mod controller;
pub mod message_handler;
pub mod sender;
pub mod ui_builder;

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use message_handler::message_handler;

pub use controller::{Incoming, Outgoing, Reply, ShopController};
