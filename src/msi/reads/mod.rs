mod extract;
mod read;

pub use extract::{extract, observed_length, ExtractParams};
pub use read::AlignedRead;
