//! Process-wide helpers shared by the VKVL crates.

pub mod logging;
