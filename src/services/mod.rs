//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and in-memory state so route handlers
//! can stay focused on protocol translation.

pub mod accounts;
pub mod clock;
pub mod history;
pub mod presence;
