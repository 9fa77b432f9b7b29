mod config;
mod domains;
mod parquet_handler;
mod pipeline;
mod records;
mod tables;
mod utils;

pub use config::*;
pub use domains::*;
pub use parquet_handler::*;
pub use pipeline::*;
pub use records::*;
pub use tables::*;
pub use utils::*;
