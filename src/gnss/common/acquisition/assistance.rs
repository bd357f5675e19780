use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Serialize, Deserialize};

use crate::Error;
use super::grid::DopplerBounds;

/// At or above this uncertainty the assisted window is sized from the uncertainty itself
pub const WIDE_UNCERTAINTY_HZ:f64 = 1000.0;

/// Half-width of the assisted window when the estimate is tight
pub const NARROW_HALF_WIDTH_HZ:f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssistanceRecord {
	pub doppler_hz:f64,
	pub doppler_uncertainty_hz:f64,
}

impl AssistanceRecord {

	/// Doppler window to search around this estimate
	pub fn search_bounds(&self, step_hz:f64) -> DopplerBounds {
		let half_width = if self.doppler_uncertainty_hz >= WIDE_UNCERTAINTY_HZ {
			2.0 * self.doppler_uncertainty_hz
		} else {
			NARROW_HALF_WIDTH_HZ
		};
		DopplerBounds::new(self.doppler_hz - half_width, self.doppler_hz + half_width, step_hz)
	}

}

/// Read side of whatever keeps the most recent Doppler estimates, keyed by PRN
pub trait AssistanceSource {
	fn read(&self, prn:usize) -> Option<AssistanceRecord>;
}

/// Shared map of assistance records.  Clones share the same storage, so a telemetry decoder can keep
/// writing while any number of acquisition instances read.  Records are swapped whole under the lock.
#[derive(Debug, Clone, Default)]
pub struct AssistanceMap {
	records:Arc<RwLock<HashMap<usize, AssistanceRecord>>>,
}

impl AssistanceMap {

	pub fn new() -> Self { Self::default() }

	pub fn write(&self, prn:usize, record:AssistanceRecord) {
		self.records.write().insert(prn, record);
	}

	pub fn remove(&self, prn:usize) -> Option<AssistanceRecord> {
		self.records.write().remove(&prn)
	}

	pub fn len(&self) -> usize { self.records.read().len() }

	pub fn is_empty(&self) -> bool { self.len() == 0 }

	/// Loads a JSON object mapping PRN to record, e.g. `{"5": {"doppler_hz": -1200.0, "doppler_uncertainty_hz": 150.0}}`
	pub fn from_json_reader<R: Read>(src:R) -> Result<Self, Error> {
		let parsed:HashMap<usize, AssistanceRecord> = serde_json::from_reader(src)?;
		log::debug!("Loaded assistance for {} satellites", parsed.len());
		Ok(Self { records: Arc::new(RwLock::new(parsed)) })
	}

}

impl AssistanceSource for AssistanceMap {

	fn read(&self, prn:usize) -> Option<AssistanceRecord> {
		self.records.read().get(&prn).copied()
	}

}

/// Source that never has anything, for running unassisted
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAssistance;

impl AssistanceSource for NoAssistance {
	fn read(&self, _prn:usize) -> Option<AssistanceRecord> { None }
}
