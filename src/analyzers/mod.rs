//! Outcome assessment pipeline.
//!
//! Groups rubric-tagged assignments by accreditation outcome, picks
//! representative submissions, computes competency statistics per outcome
//! (overall and per major), and drives a full run against the remote course.

pub mod aggregate;
pub mod analyzer;
pub mod outcomes;
pub mod sample;
pub mod types;
pub mod utility;
