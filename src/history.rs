mod aggregate;
mod sparkline;
mod store;
mod trend;

pub use self::aggregate::{parse_samples, summarize};
pub use self::sparkline::sparkline;
pub use self::store::HistoryStore;
pub use self::trend::cross_run_view;
