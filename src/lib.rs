pub mod api;
pub mod appsettings;
pub mod display;
pub mod outage;
pub mod planning;
pub mod query;
pub mod schedule;
pub mod scheduling;
pub mod storage;
pub mod telegram;
