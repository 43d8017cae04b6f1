//! TUI Module
//!
//! - event_loop: terminal setup, redraw cadence and key handling
//! - render: table drawing

mod event_loop;
mod render;

pub use event_loop::{run, TuiMessage};
pub use render::draw_dashboard;
