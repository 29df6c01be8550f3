//! Bounded execution harness and per-platform result collection.
//!
//! The pipeline here runs one platform at a time: enumerate the corpus,
//! execute each kernel under a hard deadline ([`runner`]), classify the
//! outcome ([`normalize`]), and append one block per test to the result
//! artifact ([`artifact`], [`collect`]). [`merge`] is the post-hoc
//! correction pass that splices re-run results into an existing artifact.

pub mod artifact;
pub mod collect;
pub mod corpus;
pub mod merge;
pub mod meta;
pub mod normalize;
pub mod runner;
