//! Desktop hint overlay: state machine, pure render rule and the eframe window that hosts them.

mod app;
pub mod render;
pub mod state;

pub use app::run;
pub use state::OverlayEvent;
