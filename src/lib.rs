#![warn(clippy::all)]

extern crate bit_set;
extern crate fnv;
extern crate integeriser;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate thiserror;

pub mod nfa;
pub mod util;
