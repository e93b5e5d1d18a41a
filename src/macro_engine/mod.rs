//! Macro engine: chord-bound macros and macro captures on top of the input stack.

pub mod controller;
pub mod recorder;
pub mod storage;
