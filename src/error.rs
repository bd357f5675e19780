use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	/// The Doppler grid spacing has to be strictly positive.
	#[error("doppler step must be strictly positive, got {0} [Hz]")]
	InvalidDopplerStep(f64),

	/// The requested bounds and step leave no hypothesis to test.
	#[error("doppler search grid is empty")]
	EmptyGrid,

	#[error("invalid doppler range: min={min} [Hz], max={max} [Hz]")]
	InvalidDopplerRange { min: f64, max: f64 },

	#[error("unsupported sample item type: {0}")]
	UnsupportedItemType(String),

	#[error("invalid configuration: {0}")]
	InvalidConfig(&'static str),

	/// A dwell was requested before the local code spectrum was provided.
	#[error("local code has not been set")]
	LocalCodeMissing,

	#[error("local code has {got} samples, expected {expected}")]
	LocalCodeLength { expected: usize, got: usize },

	#[error("sample window has {got} samples, expected {expected}")]
	WindowLength { expected: usize, got: usize },

	#[error("search grid has not been defined")]
	GridUndefined,

	#[error("invalid PRN {0}")]
	InvalidPrn(usize),

	/// Building the search grid ran out of memory or overflowed its size.
	#[error("unable to allocate search grid")]
	Allocation,

	#[error("block channel closed")]
	ChannelClosed,

	#[error("i/o error: {0}")]
	Io(#[from] std::io::Error),

	#[error("json error: {0}")]
	Json(#[from] serde_json::Error),
}
