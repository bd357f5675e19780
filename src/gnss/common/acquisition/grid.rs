use num_complex::Complex;
use num_traits::Zero;
use serde::{Serialize, Deserialize};

use crate::Error;
use crate::types::RowMatrix;
use super::nco;

// Keeps ratios like 0.3/0.1 from flooring one bin short
const BIN_COUNT_TOLERANCE:f64 = 1.0e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DopplerBounds {
	pub min_hz:f64,
	pub max_hz:f64,
	pub step_hz:f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DopplerHypothesis {
	pub index:usize,
	pub frequency_hz:f64,
}

impl DopplerBounds {

	pub fn new(min_hz:f64, max_hz:f64, step_hz:f64) -> Self { Self { min_hz, max_hz, step_hz } }

	pub fn validate(&self) -> Result<(), Error> {
		if !(self.step_hz > 0.0) || !self.step_hz.is_finite() {
			return Err(Error::InvalidDopplerStep(self.step_hz));
		}
		if !self.min_hz.is_finite() || !self.max_hz.is_finite() {
			return Err(Error::InvalidDopplerRange{ min: self.min_hz, max: self.max_hz });
		}
		if self.hypothesis_count() == 0 {
			return Err(Error::EmptyGrid);
		}
		Ok(())
	}

	/// Number of rows in the search grid, floor(|max - min| / step)
	pub fn hypothesis_count(&self) -> usize {
		if !(self.step_hz > 0.0) { return 0; }
		((self.max_hz - self.min_hz).abs() / self.step_hz + BIN_COUNT_TOLERANCE).floor() as usize
	}

	/// Number of bins in [min, max] with both ends included, as counted for threshold calibration
	pub fn inclusive_bin_count(&self) -> usize {
		if !(self.step_hz > 0.0) || self.max_hz < self.min_hz { return 0; }
		self.hypothesis_count() + 1
	}

	pub fn frequency_hz(&self, index:usize) -> f64 {
		self.min_hz + (index as f64) * self.step_hz
	}

	pub fn hypotheses(&self) -> impl Iterator<Item = DopplerHypothesis> {
		let bounds = *self;
		(0..self.hypothesis_count()).map(move |index| DopplerHypothesis{ index, frequency_hz: bounds.frequency_hz(index) })
	}

}

/// Doppler wipe-off table plus the energy accumulated for every (Doppler, delay) cell
#[derive(Debug)]
pub struct SearchGrid {
	bounds:DopplerBounds,
	fft_size:usize,
	wipeoffs:RowMatrix<Complex<f64>>,
	energy:RowMatrix<f64>,
	well_count:usize,
}

impl SearchGrid {

	/// Builds a zeroed grid for `bounds`.  Each row's wipe-off removes the hypothesized Doppler plus `if_hz`.
	pub fn new(bounds:DopplerBounds, fs:f64, if_hz:f64, fft_size:usize) -> Result<Self, Error> {
		bounds.validate()?;
		if fft_size == 0 { return Err(Error::InvalidConfig("FFT size must be positive")); }
		if !(fs > 0.0)   { return Err(Error::InvalidConfig("sample rate must be positive")); }

		let n:usize = bounds.hypothesis_count();
		let mut wipeoffs = RowMatrix::filled(n, fft_size, Complex::zero())?;
		let energy = RowMatrix::filled(n, fft_size, 0.0)?;

		for h in bounds.hypotheses() {
			let phase_step_rad = nco::wipeoff_phase_step_rad(h.frequency_hz + if_hz, fs);
			nco::generate_into(wipeoffs.row_mut(h.index), 0.0, phase_step_rad);
		}

		log::debug!("Defined search grid of {} Doppler bins from {} to {} [Hz] by {} [Hz], {} delay bins",
			n, bounds.min_hz, bounds.frequency_hz(n-1), bounds.step_hz, fft_size);

		Ok(Self { bounds, fft_size, wipeoffs, energy, well_count: 0 })
	}

	/// Zeroes the accumulated energy and dwell count without reallocating
	pub fn reset(&mut self) {
		self.energy.fill(0.0);
		self.well_count = 0;
	}

	/// Frees the grid; taking `self` by value makes any later use a compile error
	pub fn release(self) {
		log::debug!("Releasing search grid of {} Doppler bins", self.num_hypotheses());
	}

	pub fn bounds(&self) -> DopplerBounds { self.bounds }
	pub fn fft_size(&self) -> usize { self.fft_size }
	pub fn num_hypotheses(&self) -> usize { self.energy.rows() }
	pub fn well_count(&self) -> usize { self.well_count }

	pub fn hypotheses(&self) -> impl Iterator<Item = DopplerHypothesis> { self.bounds.hypotheses() }

	pub fn wipeoff(&self, index:usize) -> &[Complex<f64>] { self.wipeoffs.row(index) }
	pub fn energy_row(&self, index:usize) -> &[f64] { self.energy.row(index) }
	pub fn energy(&self) -> &RowMatrix<f64> { &self.energy }

	pub(super) fn wipeoff_and_energy_mut(&mut self, index:usize) -> (&[Complex<f64>], &mut [f64]) {
		(self.wipeoffs.row(index), self.energy.row_mut(index))
	}

	pub(super) fn finish_dwell(&mut self) { self.well_count += 1; }

}
