//! Terminal UI: chat screen plus the configuration form.

pub mod app;
pub mod chat;
pub mod form;

pub use app::run;
