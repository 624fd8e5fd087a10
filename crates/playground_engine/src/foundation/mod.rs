//! Foundation module - utilities shared by the whole engine

pub mod logging;
