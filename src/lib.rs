//! # coptool - Weighted Constraint Optimization over Incremental SAT
//!
//! `coptool` models weighted constraint satisfaction problems, such as nurse rostering, and
//! optimizes them either through an incremental SAT-based CSP session or an external
//! weighted local-search solver.
//!
//! - [`model`]: variables over finite domains and hard or weighted soft constraints
//! - [`translate`]: compilation of a model for either backend
//! - [`csp`]: the incremental CSP session on top of a SAT solver from [`solvers`]
//! - [`scop`]: weighted-linear instances and the external local-search solver
//! - [`methods`]: optimization strategies producing a [`methods::Report`]

pub mod csp;
pub mod encodings;
pub mod methods;
pub mod model;
pub mod scop;
pub mod solvers;
pub mod translate;
pub mod types;
