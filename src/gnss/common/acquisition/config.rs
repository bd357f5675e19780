use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};

use crate::Error;
use crate::io::ItemType;
use super::LocalCode;
use super::grid::DopplerBounds;
use super::threshold;

/// Settings for one acquisition engine, read once when an instance is built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
	pub item_type:String,
	pub fs_hz:f64,
	pub if_hz:f64,
	pub coherent_integration_ms:usize,
	pub doppler_max_hz:f64,
	pub doppler_min_hz:Option<f64>,
	pub doppler_step_hz:f64,
	pub max_dwells:usize,
	/// Data bits can flip inside a window, so two dwells are always run
	pub bit_transition_flag:bool,
	/// Zero means the fixed `threshold` is used instead
	pub pfa:f64,
	pub channel_pfa:HashMap<usize, f64>,
	pub threshold:f64,
	pub dump:bool,
	pub dump_dir:PathBuf,
}

impl Default for AcquisitionConfig {

	fn default() -> Self {
		Self {
			item_type: "gr_complex".to_string(),
			fs_hz: 4.0e6,
			if_hz: 0.0,
			coherent_integration_ms: 1,
			doppler_max_hz: 5000.0,
			doppler_min_hz: None,
			doppler_step_hz: 500.0,
			max_dwells: 1,
			bit_transition_flag: false,
			pfa: 0.0,
			channel_pfa: HashMap::new(),
			threshold: 40.0,
			dump: false,
			dump_dir: PathBuf::from("./data"),
		}
	}

}

impl AcquisitionConfig {

	pub fn from_json_file<P: AsRef<Path>>(path:P) -> Result<Self, Error> {
		let file = File::open(path)?;
		let cfg:Self = serde_json::from_reader(BufReader::new(file))?;
		cfg.validate()?;
		Ok(cfg)
	}

	pub fn validate(&self) -> Result<(), Error> {
		self.item_type()?;
		if !(self.fs_hz > 0.0) || !self.fs_hz.is_finite() {
			return Err(Error::InvalidConfig("sample rate must be positive"));
		}
		if self.coherent_integration_ms == 0 {
			return Err(Error::InvalidConfig("coherent integration must be at least 1 ms"));
		}
		if self.max_dwells == 0 {
			return Err(Error::InvalidConfig("at least one dwell is required"));
		}
		let pfas = std::iter::once(&self.pfa).chain(self.channel_pfa.values());
		for pfa in pfas {
			if !(*pfa >= 0.0 && *pfa < 1.0) {
				return Err(Error::InvalidConfig("false alarm probability must be in [0, 1)"));
			}
		}
		let bounds = self.doppler_bounds();
		if bounds.min_hz >= bounds.max_hz {
			return Err(Error::InvalidDopplerRange{ min: bounds.min_hz, max: bounds.max_hz });
		}
		bounds.validate()
	}

	pub fn item_type(&self) -> Result<ItemType, Error> { self.item_type.parse() }

	/// Full unassisted search range
	pub fn doppler_bounds(&self) -> DopplerBounds {
		let min_hz = self.doppler_min_hz.unwrap_or(-self.doppler_max_hz);
		DopplerBounds::new(min_hz, self.doppler_max_hz, self.doppler_step_hz)
	}

	pub fn effective_max_dwells(&self) -> usize {
		if self.bit_transition_flag { 2 } else { self.max_dwells }
	}

	pub fn pfa_for_channel(&self, channel:usize) -> f64 {
		self.channel_pfa.get(&channel).copied().unwrap_or(self.pfa)
	}

	/// Calibrated threshold when a false alarm probability is set for this channel, the fixed one otherwise
	pub fn threshold_for(&self, channel:usize, fft_size:usize) -> f64 {
		let pfa = self.pfa_for_channel(channel);
		if pfa == 0.0 {
			self.threshold
		} else {
			threshold::threshold(pfa, &self.doppler_bounds(), fft_size)
		}
	}

	/// Samples per FFT window: one sampled code period, times the coherent integration length
	pub fn fft_size(&self, code:&dyn LocalCode) -> usize {
		code.samples_per_code(self.fs_hz) * self.coherent_integration_ms
	}

}
