pub mod analytics;
pub mod core;
pub mod sections;
pub mod setup;
pub mod teachers;
pub mod timetable;
pub mod timing;
