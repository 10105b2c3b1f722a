pub mod fleet;

pub use fleet::{Fleet, FleetConfig, FleetError, Load, PolicyState};
