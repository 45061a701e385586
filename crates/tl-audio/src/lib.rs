//! Audio output backends for tapeline.

mod cpal_backend;

pub use cpal_backend::CpalContext;
