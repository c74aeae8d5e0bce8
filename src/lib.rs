pub mod app;
pub mod cli;
pub mod errors;
pub mod import_list;
pub mod model;
pub mod pipeline;
pub mod steam;
pub mod ui;
pub mod vdf;
