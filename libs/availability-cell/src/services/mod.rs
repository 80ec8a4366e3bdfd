pub mod slots;
pub mod store;

pub use slots::generate_slots;
pub use store::AvailabilityStore;
