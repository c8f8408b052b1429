// bookmark-modal state managers
// Managers own stateful pieces: the modal session, host bookkeeping and the local store.

pub mod bookmark_store;
pub mod host_bridge;
pub mod modal_controller;
