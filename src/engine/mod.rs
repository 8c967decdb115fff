pub mod lifecycle;
pub mod scoring;
