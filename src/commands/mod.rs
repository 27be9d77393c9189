pub mod classify;
pub mod extract;
pub mod model;
