#![allow(dead_code)]
#![allow(unused_imports)]

pub mod assertions;
pub mod environment;
pub mod fixtures;

pub use assertions::{assert_dnat_rules, dnat};
pub use environment::TestEnvironment;
