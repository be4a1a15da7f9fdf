//! Command-line front ends for tunnelwatch
//!
//! The binaries in `src/bin` only parse arguments and wire real
//! collaborators; the commands live here so they can be driven with fakes.

pub mod cli;
