mod dissect;
mod ground_truth;
mod normalizer;
mod reader;

pub use dissect::*;
pub use ground_truth::*;
pub use normalizer::*;
pub use reader::*;
