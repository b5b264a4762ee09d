//! Backend traits and the type-erased resource and event wrappers

mod event;
mod resource;
mod traits;

pub use event::Event;
pub use resource::Resource;
pub use traits::{Backend, BackendEvent};

pub(crate) use traits::sealed;
