mod answer;
mod context;
mod error;
mod model;
mod packet;
mod question;
mod record;
mod retry;
mod tool;

pub use answer::*;
pub use context::*;
pub use error::*;
pub use model::*;
pub use packet::*;
pub use question::*;
pub use record::*;
pub use retry::*;
pub use tool::*;
