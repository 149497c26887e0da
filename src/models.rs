pub mod day;
pub mod task;
pub mod weekday;
