//! Collaborator layer.
//!
//! The controller talks to the update repository and the navigator only
//! through the traits in [`traits`]; [`mock`] and [`sim`] provide in-process
//! implementations.

pub mod mock;
pub mod sim;
pub mod traits;

pub use mock::{MockNavigator, MockRepository};
pub use sim::SimulatedRepository;
pub use traits::{Navigator, ResultStream, StatusStream, UpdateRepository};
