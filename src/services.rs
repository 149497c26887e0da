pub mod cursor;
pub mod filters;
pub mod history;
pub mod ids;
pub mod session;
pub mod tasks;
