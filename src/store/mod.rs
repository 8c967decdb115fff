pub mod locations;
pub mod orders;

pub use locations::LocationStore;
pub use orders::{OrderStore, Transition};
