// Application layer - Use cases and state machines
pub mod events;
pub mod load_state;
pub mod placement;
pub mod scheduler;
pub mod session;
pub mod structure_repository;
pub mod version_manager;
