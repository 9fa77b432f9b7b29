mod match_stations;
mod roster;

pub use match_stations::*;
pub use roster::*;
