pub mod index;
pub mod probes;
pub mod prompt;
