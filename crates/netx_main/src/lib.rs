mod app;
mod cli;
mod config;
pub mod logging;
mod scraper;

pub use app::*;
pub use cli::*;
pub use config::*;
pub use scraper::*;
