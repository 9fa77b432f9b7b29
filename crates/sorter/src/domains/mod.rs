mod series;
mod stations;
mod timeline;

pub use series::*;
pub use stations::*;
pub use timeline::*;
