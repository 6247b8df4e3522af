//! Narrative Script: a small scripting language for branching visual novels.
//!
//! Turns hand-authored scene scripts into statement trees and steps
//! through them one player interaction at a time, reporting dialogue,
//! choices and media cues to a host-provided presenter.

pub mod core;
pub mod schema;
