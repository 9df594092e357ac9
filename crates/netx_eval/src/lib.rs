mod evaluator;
mod judge;
mod report;
mod scoring;

pub use evaluator::*;
pub use judge::*;
pub use report::*;
pub use scoring::*;
