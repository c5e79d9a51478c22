pub mod strategy;
pub mod synth;
