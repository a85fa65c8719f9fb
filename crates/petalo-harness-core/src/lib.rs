pub mod catalog;
pub mod codec;
pub mod domain;
pub mod harness;
pub mod suite;
pub mod synth;
pub mod tables;
pub mod validate;
