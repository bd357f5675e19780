
use rustfft::num_complex::Complex;

pub mod block;

pub mod error;
pub mod fourier_analysis;
pub mod io;
pub mod gnss;
pub mod types;

pub use error::Error;

#[derive(Debug, Clone)]
pub struct Sample {
	pub val: Complex<f64>,
	pub idx: usize,
}
