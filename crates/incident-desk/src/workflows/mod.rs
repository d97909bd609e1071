pub mod incidents;
pub mod report;
pub mod roster;
pub mod summaries;
