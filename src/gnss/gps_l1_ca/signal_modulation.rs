
use rustfft::num_complex::Complex;

use crate::Error;
use crate::gnss::common::acquisition::LocalCode;
use super::{CHIP_RATE_HZ, CODE_LENGTH, MAX_PRN, MIN_PRN};

// G2 output taps (1-based stages) for each PRN, given in IS-GPS-200K, Table 3-Ia
const G2_PHASE_TAPS:[(usize, usize); 32] = [
	(2, 6), (3, 7), (4, 8), (5, 9), (1, 9), (2, 10), (1, 8), (2, 9),	// PRN 01-08
	(3, 10), (2, 3), (3, 4), (5, 6), (6, 7), (7, 8), (8, 9), (9, 10),	// PRN 09-16
	(1, 4), (2, 5), (3, 6), (4, 7), (5, 8), (6, 9), (1, 3), (4, 6),		// PRN 17-24
	(5, 7), (6, 8), (7, 9), (8, 10), (1, 6), (2, 7), (3, 8), (4, 9),	// PRN 25-32
];

const G1_FEEDBACK:[usize; 2] = [3, 10];
const G2_FEEDBACK:[usize; 6] = [2, 3, 6, 8, 9, 10];

/// Ten-stage Fibonacci register; `state[0]` is stage 1
pub struct ShiftRegister {
	pub state: [bool; 10],
}

impl ShiftRegister {

	pub fn all_ones() -> Self { Self { state: [true; 10] } }

	pub fn stage(&self, n:usize) -> bool { self.state[n-1] }

	pub fn shift(&mut self, feedback_taps:&[usize]) {
		let feedback:bool = feedback_taps.iter().fold(false, |acc, t| acc ^ self.state[t-1]);
		for idx in (1..10).rev() {
			self.state[idx] = self.state[idx-1];
		}
		self.state[0] = feedback;
	}

}

/// One period of the C/A code for `prn` as logic levels
pub fn ca_code(prn:usize) -> Result<[bool; CODE_LENGTH], Error> {
	if prn < MIN_PRN || prn > MAX_PRN {
		return Err(Error::InvalidPrn(prn));
	}

	let (t1, t2) = G2_PHASE_TAPS[prn-1];
	let mut g1 = ShiftRegister::all_ones();
	let mut g2 = ShiftRegister::all_ones();
	let mut ans:[bool; CODE_LENGTH] = [false; CODE_LENGTH];
	for chip in ans.iter_mut() {
		*chip = g1.stage(10) ^ g2.stage(t1) ^ g2.stage(t2);
		g1.shift(&G1_FEEDBACK);
		g2.shift(&G2_FEEDBACK);
	}
	Ok(ans)
}

/// One code period as +/-1 chips
pub fn prn_complex(prn:usize) -> Result<Vec<Complex<f64>>, Error> {
	Ok(ca_code(prn)?.iter().map(|b| Complex{ re: if *b { 1.0 } else { -1.0 }, im: 0.0 }).collect())
}

/// GPS L1 C/A local code
#[derive(Debug, Clone, Copy, Default)]
pub struct L1Ca;

impl LocalCode for L1Ca {

	fn system(&self) -> &'static str { "G" }
	fn signal(&self) -> &'static str { "1C" }
	fn chip_rate_hz(&self) -> f64 { CHIP_RATE_HZ }
	fn code_length_chips(&self) -> usize { CODE_LENGTH }

	fn sampled(&self, prn:usize, fs:f64) -> Result<Vec<Complex<f64>>, Error> {
		if !(fs > 0.0) {
			return Err(Error::InvalidConfig("sample rate must be positive"));
		}
		let code = prn_complex(prn)?;
		let samples_per_code:usize = self.samples_per_code(fs);

		Ok((0..samples_per_code).map(|i| {
			let code_value_idx:usize = ((i as f64) * CHIP_RATE_HZ / fs) as usize;
			if code_value_idx >= CODE_LENGTH { code[CODE_LENGTH-1] } else { code[code_value_idx] }
		}).collect())
	}

}
