pub mod evaluate;
pub mod filter_order;
pub mod filter_where;
pub mod paginate;
pub mod pipeline;
pub mod projection;
pub mod raw;
pub mod types;

pub use pipeline::QueryPipeline;
pub use raw::RawQuery;
pub use types::*;
