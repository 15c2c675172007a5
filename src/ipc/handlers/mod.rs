pub mod core;
pub mod events;
pub mod matrix;
pub mod registry;
pub mod session;
pub mod settings;
pub mod workflow;
