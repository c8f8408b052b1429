//! bookmark-modal: the editing core behind a forum's bookmark modal.
//!
//! Reminder resolution, the save/delete/close state machine, persistence
//! adapters and a JSON-RPC host. This library crate exposes all modules for
//! use by the binary and integration tests.

pub mod app;
pub mod database;
pub mod managers;
pub mod platform;
pub mod rpc_handler;
pub mod services;
pub mod types;
