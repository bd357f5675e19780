use std::f64::consts;

use rustfft::num_complex::Complex;

/// Phase increment per sample that removes a carrier at `freq_hz` when multiplied into the signal
pub fn wipeoff_phase_step_rad(freq_hz:f64, fs:f64) -> f64 {
	(-2.0 * consts::PI * freq_hz) / fs
}

/// exp(j*(start_phase_rad + n*phase_step_rad)) for n in 0..length
pub fn generate(length:usize, start_phase_rad:f64, phase_step_rad:f64) -> Vec<Complex<f64>> {
	debug_assert!(length > 0, "NCO length has to be positive");
	(0..length).map(|idx| {
		// Computing each phase directly keeps rounding error from building up along the sequence
		let phase = start_phase_rad + phase_step_rad * (idx as f64);
		Complex{ re: phase.cos(), im: phase.sin() }
	}).collect()
}

/// Same as `generate`, written into an existing buffer
pub fn generate_into(out:&mut [Complex<f64>], start_phase_rad:f64, phase_step_rad:f64) {
	for (idx, x) in out.iter_mut().enumerate() {
		let phase = start_phase_rad + phase_step_rad * (idx as f64);
		*x = Complex{ re: phase.cos(), im: phase.sin() };
	}
}
