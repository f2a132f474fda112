pub mod api;
pub mod categories;
pub mod main;
