pub mod job;
pub mod payload;
