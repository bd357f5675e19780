use rustfft::num_complex::Complex;

use super::grid::SearchGrid;

/// Location and raw value of the largest cell in the energy grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
	pub doppler_index:usize,
	pub delay_index:usize,
	pub magnitude:f64,
}

/// Peak translated into physical units along with its test statistic
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
	pub peak:Peak,
	pub delay_samples:usize,
	pub doppler_hz:f64,
	pub test_statistic:f64,
}

/// Scans rows in Doppler order and cells in delay order; a cell only takes over if it's strictly larger,
/// so the first of several equal maxima wins and the recorded delay always belongs to the recorded row
pub fn find_peak(grid:&SearchGrid) -> Peak {
	let mut best = Peak{ doppler_index: 0, delay_index: 0, magnitude: 0.0 };
	let mut first = true;
	for (doppler_index, row) in grid.energy().iter_rows().enumerate() {
		for (delay_index, magnitude) in row.iter().enumerate() {
			if first || *magnitude > best.magnitude {
				best = Peak{ doppler_index, delay_index, magnitude: *magnitude };
				first = false;
			}
		}
	}
	best
}

impl Peak {

	/// Undo the N^2 amplitude gain of the unnormalized forward and inverse transforms (N^4 in power)
	pub fn normalized_magnitude(&self, fft_size:usize) -> f64 {
		let fft_normalization_factor:f64 = (fft_size as f64) * (fft_size as f64);
		self.magnitude / (fft_normalization_factor * fft_normalization_factor)
	}

	/// 2 N |peak|^2 / (P * dwells), zero when there's no input power to normalize by
	pub fn test_statistic(&self, fft_size:usize, input_power:f64, well_count:usize) -> f64 {
		if !(input_power > 0.0) || well_count == 0 {
			return 0.0;
		}
		2.0 * (fft_size as f64) * self.normalized_magnitude(fft_size) / (input_power * (well_count as f64))
	}

}

/// Finds the peak of `grid` and expresses it as a delay, a Doppler frequency and a test statistic
pub fn detect(grid:&SearchGrid, input_power:f64) -> Detection {
	let peak = find_peak(grid);
	let test_statistic = peak.test_statistic(grid.fft_size(), input_power, grid.well_count());
	Detection{ peak, delay_samples: peak.delay_index, doppler_hz: grid.bounds().frequency_hz(peak.doppler_index), test_statistic }
}

/// Mean squared magnitude of the window
pub fn estimate_power(window:&[Complex<f64>]) -> f64 {
	if window.is_empty() {
		return 0.0;
	}
	let input_power_total:f64 = window.iter().map(|c| c.norm_sqr()).sum();
	input_power_total / (window.len() as f64)
}

#[cfg(test)]
mod tests {

	use rustfft::num_complex::Complex;

	use super::*;
	use crate::gnss::common::acquisition::grid::DopplerBounds;
	use crate::gnss::common::acquisition::kernel::CorrelationKernel;

	fn empty_grid() -> SearchGrid {
		SearchGrid::new(DopplerBounds::new(-1000.0, 1000.0, 500.0), 4.0e6, 0.0, 16).unwrap()
	}

	// Drives a real kernel with a window whose correlation has a single known peak
	fn grid_with_impulse(delay:usize) -> SearchGrid {
		let mut code = vec![Complex{ re: 0.0, im: 0.0 }; 16];
		code[0] = Complex{ re: 1.0, im: 0.0 };
		let mut window = vec![Complex{ re: 0.0, im: 0.0 }; 16];
		window[delay] = Complex{ re: 1.0, im: 0.0 };

		let mut kernel = CorrelationKernel::new(16);
		kernel.set_local_code(&code).unwrap();
		let mut grid = empty_grid();
		kernel.accumulate_dwell(&window, &mut grid).unwrap();
		grid
	}

	#[test]
	fn all_zero_grid_reports_first_cell() {
		let grid = empty_grid();
		assert_eq!(find_peak(&grid), Peak{ doppler_index: 0, delay_index: 0, magnitude: 0.0 });
	}

	#[test]
	fn ties_go_to_lowest_doppler_then_lowest_delay() {
		let mut grid = empty_grid();
		for &(row, col) in &[(3, 1), (1, 9), (1, 4), (2, 0)] {
			let (_, energy) = grid.wipeoff_and_energy_mut(row);
			energy[col] = 7.0;
		}
		let peak = find_peak(&grid);
		assert_eq!((peak.doppler_index, peak.delay_index, peak.magnitude), (1, 4, 7.0));

		// A strictly larger cell later in the scan still wins, and keeps its own delay
		let (_, energy) = grid.wipeoff_and_energy_mut(3);
		energy[12] = 7.5;
		let peak = find_peak(&grid);
		assert_eq!((peak.doppler_index, peak.delay_index), (3, 12));
	}

	#[test]
	fn normalization_and_test_statistic() {
		let mut grid = grid_with_impulse(3);
		grid.finish_dwell();
		let peak = find_peak(&grid);
		assert_eq!(peak.delay_index, 3);
		// Unit-energy code, so only the inverse transform's gain of N shows up in amplitude
		assert!((peak.magnitude - 256.0).abs() < 1.0e-9);
		assert!((peak.normalized_magnitude(16) - 1.0/256.0).abs() < 1.0e-12);
		assert!((peak.test_statistic(16, 0.5, 2) - 0.125).abs() < 1.0e-12);
		assert_eq!(peak.test_statistic(16, 0.0, 1), 0.0);
		assert_eq!(peak.test_statistic(16, -1.0, 1), 0.0);
		assert_eq!(peak.test_statistic(16, 1.0, 0), 0.0);

		// Two dwells are on the grid now
		let detection = detect(&grid, 1.0 / 16.0);
		assert_eq!(detection.delay_samples, 3);
		assert_eq!(detection.doppler_hz, grid.bounds().frequency_hz(detection.peak.doppler_index));
		assert!((detection.test_statistic - 1.0).abs() < 1.0e-9);
	}

	#[test]
	fn power_is_mean_squared_magnitude() {
		let window = vec![Complex{ re: 3.0, im: 4.0 }, Complex{ re: 0.0, im: 0.0 }, Complex{ re: -1.0, im: 0.0 }, Complex{ re: 0.0, im: 2.0 }];
		assert!((estimate_power(&window) - 7.5).abs() < 1.0e-12);
		assert_eq!(estimate_power(&[]), 0.0);
	}

}
