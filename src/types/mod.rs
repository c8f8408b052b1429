// bookmark-modal shared type definitions
// Each submodule defines types used across the modal core, adapters and host.

pub mod bookmark;
pub mod errors;
pub mod modal;
pub mod settings;
