mod calendar;
mod hourly_timeline;

pub use calendar::*;
pub use hourly_timeline::*;
