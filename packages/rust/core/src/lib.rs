//! Core domain logic for Pluqqy.
//!
//! This crate turns stored pipelines into composed documents and answers
//! search queries over the component pools.

pub mod composer;
pub mod diagram;
pub mod search;

pub use composer::{compose_pipeline, output_path_for, write_output};
pub use search::{Condition, Query, cycle_type, toggle_archived};
