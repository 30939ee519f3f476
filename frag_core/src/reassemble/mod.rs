mod reassemble;

pub use reassemble::{DatagramReassembler, Hole};
