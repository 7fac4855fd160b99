// Common tools

pub mod gate;
