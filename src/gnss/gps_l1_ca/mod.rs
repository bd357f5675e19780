
pub mod signal_modulation;

pub const CHIP_RATE_HZ:f64 = 1.023e6;
pub const CODE_LENGTH:usize = 1023;

pub const MIN_PRN:usize = 1;
pub const MAX_PRN:usize = 32;
