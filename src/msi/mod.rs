pub mod baseline;
pub mod classify;
pub mod consensus;
pub mod histogram;
pub mod locus;
pub mod model;
pub mod reads;
pub mod report;
pub mod result;
pub mod run;
