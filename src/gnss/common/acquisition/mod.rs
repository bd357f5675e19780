
use std::sync::mpsc;

use rustfft::num_complex::Complex;
use serde::{Serialize, Deserialize};

use crate::Error;

pub mod assistance;
pub mod assisted_pcps;
pub mod config;
pub mod dump;
pub mod grid;
pub mod kernel;
pub mod nco;
pub mod peak;
pub mod threshold;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionResult {
	pub delay_samples:usize,
	pub doppler_hz:f64,
	pub sample_stamp:usize,
	pub test_statistic:f64,
	pub input_power:f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
	Positive,
	Negative,
}

/// What a channel learns when an acquisition attempt finishes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionReport {
	pub prn:usize,
	pub channel:usize,
	pub outcome:Outcome,
	pub test_statistic:f64,
	pub threshold:f64,
	/// Only present for a positive acquisition
	pub result:Option<AcquisitionResult>,
}

pub trait ResultSink {
	fn notify(&self, report:&AcquisitionReport);
}

impl ResultSink for mpsc::Sender<AcquisitionReport> {

	fn notify(&self, report:&AcquisitionReport) {
		if self.send(report.clone()).is_err() {
			log::warn!("Channel {} dropped the acquisition report for PRN {}", report.channel, report.prn);
		}
	}

}

/// Supplies one period of a satellite's spreading code sampled at a given rate
pub trait LocalCode {
	fn system(&self) -> &'static str;
	fn signal(&self) -> &'static str;
	fn chip_rate_hz(&self) -> f64;
	fn code_length_chips(&self) -> usize;
	fn sampled(&self, prn:usize, fs:f64) -> Result<Vec<Complex<f64>>, Error>;

	fn samples_per_code(&self, fs:f64) -> usize {
		(fs / (self.chip_rate_hz() / self.code_length_chips() as f64)).round() as usize
	}
}
