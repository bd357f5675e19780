
use std::sync::Arc;

use rustfft::FFTplanner;
use rustfft::FFT as FftAlgorithm;
use num_complex::Complex;
use num_traits::Zero;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
	Forward,
	Inverse,
}

/// Fixed-size, unnormalized transform in either direction.  Neither direction scales its output,
/// so a forward/inverse round trip multiplies the signal by `len()`.
pub struct FFT {
	n: usize,
	plan: Arc<dyn FftAlgorithm<f64>>,
	scratch: Vec<Complex<f64>>,
}

impl FFT {

	pub fn new(n:usize, direction:Direction) -> Self {
		let mut planner = FFTplanner::new(direction == Direction::Inverse);
		let plan = planner.plan_fft(n);
		FFT { n, plan, scratch: vec![Complex::zero(); n] }
	}

	pub fn len(&self) -> usize { self.n }

	/// Transforms `input` into `output`; `input` is used as working memory and its contents are lost
	pub fn process(&self, input:&mut [Complex<f64>], output:&mut [Complex<f64>]) {
		self.plan.process(input, output);
	}

	/// Copying variant for callers that need to keep their input
	pub fn execute(&mut self, input:&[Complex<f64>]) -> Vec<Complex<f64>> {
		self.scratch.copy_from_slice(input);
		let mut output:Vec<Complex<f64>> = vec![Complex::zero(); self.n];
		self.plan.process(&mut self.scratch, &mut output);
		output
	}

}
