//! # coptool-tools - Command Line Front End and Instance Generators for coptool
//!
//! This crate contains the `coptool` binary and generators for toy instances that are shared
//! between the binary and the integration tests of the library.

pub mod instances {
    //! # Instance Generators

    pub mod magic_square;
    pub mod roster;

    pub use magic_square::magic_square;
    pub use roster::{Roster, RosterParams};
}
