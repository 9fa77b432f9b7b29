mod align_series;
mod observation_pool;

pub use align_series::*;
pub use observation_pool::*;
