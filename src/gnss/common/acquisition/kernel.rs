use num_complex::Complex;
use num_traits::Zero;

use crate::Error;
use crate::fourier_analysis::{Direction, FFT};
use super::grid::SearchGrid;

/// FFT-based circular correlation of one window against the local code, for every Doppler row of a grid
pub struct CorrelationKernel {
	fft_size:usize,
	fft:FFT,
	ifft:FFT,
	code_spectrum_conj:Option<Vec<Complex<f64>>>,
	wiped:Vec<Complex<f64>>,
	spectrum:Vec<Complex<f64>>,
	product:Vec<Complex<f64>>,
	correlation:Vec<Complex<f64>>,
}

impl CorrelationKernel {

	pub fn new(fft_size:usize) -> Self {
		let fft  = FFT::new(fft_size, Direction::Forward);
		let ifft = FFT::new(fft_size, Direction::Inverse);
		let scratch:Vec<Complex<f64>> = vec![Complex::zero(); fft_size];
		Self { fft_size, fft, ifft, code_spectrum_conj: None,
			wiped: scratch.clone(), spectrum: scratch.clone(), product: scratch.clone(), correlation: scratch }
	}

	pub fn fft_size(&self) -> usize { self.fft_size }

	/// Takes the time-domain code replica (already `fft_size` long) and keeps its conjugated spectrum
	pub fn set_local_code(&mut self, replica:&[Complex<f64>]) -> Result<(), Error> {
		if replica.len() != self.fft_size {
			return Err(Error::LocalCodeLength{ expected: self.fft_size, got: replica.len() });
		}
		let spectrum:Vec<Complex<f64>> = self.fft.execute(replica);
		self.code_spectrum_conj = Some(spectrum.into_iter().map(|c| c.conj()).collect());
		Ok(())
	}

	pub fn set_local_code_spectrum(&mut self, code_spectrum_conj:Vec<Complex<f64>>) -> Result<(), Error> {
		if code_spectrum_conj.len() != self.fft_size {
			return Err(Error::LocalCodeLength{ expected: self.fft_size, got: code_spectrum_conj.len() });
		}
		self.code_spectrum_conj = Some(code_spectrum_conj);
		Ok(())
	}

	/// Adds |IFFT(FFT(window * wipeoff) * code*)|^2 into every energy row, then counts the dwell.
	/// Only the first `fft_size` samples of the window are used.
	pub fn accumulate_dwell(&mut self, window:&[Complex<f64>], grid:&mut SearchGrid) -> Result<(), Error> {
		let n = self.fft_size;
		let code = self.code_spectrum_conj.as_ref().ok_or(Error::LocalCodeMissing)?;
		if window.len() < n {
			return Err(Error::WindowLength{ expected: n, got: window.len() });
		}
		if grid.fft_size() != n {
			return Err(Error::InvalidConfig("search grid and correlator FFT sizes differ"));
		}

		for doppler_idx in 0..grid.num_hypotheses() {
			let (wipeoff, energy) = grid.wipeoff_and_energy_mut(doppler_idx);

			// Wipe the carrier off the input signal
			for ((w, x), c) in self.wiped.iter_mut().zip(window[..n].iter()).zip(wipeoff.iter()) {
				*w = x * c;
			}

			self.fft.process(&mut self.wiped, &mut self.spectrum);

			// Multiplication in the freq domain is circular correlation in the time domain
			for ((p, s), c) in self.product.iter_mut().zip(self.spectrum.iter()).zip(code.iter()) {
				*p = s * c;
			}

			self.ifft.process(&mut self.product, &mut self.correlation);

			for (e, c) in energy.iter_mut().zip(self.correlation.iter()) {
				*e += c.norm_sqr();
			}
		}

		grid.finish_dwell();
		Ok(())
	}

}
