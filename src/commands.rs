pub mod gate;
pub mod latest;
pub mod manifest;
pub mod status;
pub mod summarize;
pub mod trend;
