//! Observable flow state and the transition logic that drives it.

pub mod command;
pub mod reducer;
pub mod view;

pub use command::UserCommand;
pub use reducer::{FlowCore, Inbound};
pub use view::{FlowPhase, FlowState};
