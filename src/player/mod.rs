pub mod clock;
pub mod simulated;

pub use clock::{ClockEvent, MediaClock, Readiness};
pub use simulated::SimulatedClock;
