pub mod background;
pub mod catalog;
pub mod charts;
pub mod config;
pub mod fetch;
pub mod health;
pub mod records;
pub mod routes;
pub mod settings;
pub mod state;
pub mod stats;
pub mod url_history;
pub mod view_state;
