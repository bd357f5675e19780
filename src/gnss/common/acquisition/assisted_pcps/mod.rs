
use std::path::PathBuf;
use std::sync::Arc;

use rustfft::num_complex::Complex;

use crate::Error;
use crate::block::{BlockFunctionality, BlockResult};
use crate::io::SampleWindow;
use super::{AcquisitionReport, AcquisitionResult, LocalCode, Outcome, ResultSink};
use super::assistance::AssistanceSource;
use super::config::AcquisitionConfig;
use super::dump;
use super::grid::{DopplerBounds, DopplerHypothesis, SearchGrid};
use super::kernel::CorrelationKernel;
use super::peak;

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
	StandBy,
	GetAssist,
	ComputeGrid,
	Decide,
	RedefineGrid,
	PositiveAcq,
	NegativeAcq,
}

impl Default for State {
	fn default() -> Self { State::StandBy }
}

/// What the work done in the current state produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
	Idle,
	Activated,
	GridDefined,
	DwellAccumulated{ complete:bool },
	AboveThreshold,
	BelowThreshold{ assist_disabled:bool },
	Reported,
	Deactivated,
}

/// Side effect the instance carries out after moving to the next state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
	None,
	DisableAssist,
	PublishPositive,
	PublishNegative,
	ReleaseGrid,
}

pub fn transition(state:State, event:Event) -> (State, Effect) {
	match (state, event) {
		(_, Event::Deactivated)                                  => (State::StandBy,      Effect::ReleaseGrid),
		(State::StandBy, Event::Idle)                            => (State::StandBy,      Effect::None),
		(State::StandBy, Event::Activated)                       => (State::GetAssist,    Effect::None),
		(State::GetAssist, Event::GridDefined)                   => (State::ComputeGrid,  Effect::None),
		(State::ComputeGrid, Event::DwellAccumulated{ complete }) => if complete { (State::Decide, Effect::None) } else { (State::ComputeGrid, Effect::None) },
		(State::Decide, Event::AboveThreshold)                   => (State::PositiveAcq,  Effect::None),
		(State::Decide, Event::BelowThreshold{ assist_disabled }) => if assist_disabled { (State::NegativeAcq, Effect::None) } else { (State::RedefineGrid, Effect::DisableAssist) },
		(State::RedefineGrid, Event::GridDefined)                => (State::ComputeGrid,  Effect::None),
		(State::PositiveAcq, Event::Reported)                    => (State::StandBy,      Effect::PublishPositive),
		(State::NegativeAcq, Event::Reported)                    => (State::StandBy,      Effect::PublishNegative),
		(state, event) => {
			log::warn!("Ignoring event {:?} in state {:?}", event, state);
			(state, Effect::None)
		}
	}
}

/// Everything an instance needs, already resolved from the configuration and the local code
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionParams {
	pub prn:usize,
	pub channel:usize,
	pub system:&'static str,
	pub signal:&'static str,
	pub fs_hz:f64,
	pub if_hz:f64,
	pub fft_size:usize,
	/// Full unassisted range
	pub bounds:DopplerBounds,
	pub max_dwells:usize,
	pub threshold:f64,
	pub dump_dir:Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcquisitionContext {
	pub sample_counter:usize,
	pub well_count:usize,
	pub disable_assist:bool,
	pub state:State,
	pub test_statistic:f64,
	pub input_power:f64,
	pub delay_samples:usize,
	pub doppler_hz:f64,
	pub sample_stamp:usize,
}

/// PCPS acquisition of one satellite on one channel, narrowed by Doppler assistance when it's available
/// and falling back to the full configured range when the assisted search comes up empty
pub struct Acquisition {
	params:AcquisitionParams,
	context:AcquisitionContext,
	active:bool,
	kernel:CorrelationKernel,
	grid:Option<SearchGrid>,
	assistance:Arc<dyn AssistanceSource + Send + Sync>,
	sink:Option<Box<dyn ResultSink + Send>>,
}

impl Acquisition {

	pub fn new(cfg:&AcquisitionConfig, prn:usize, channel:usize, code:&dyn LocalCode, assistance:Arc<dyn AssistanceSource + Send + Sync>) -> Result<Self, Error> {
		cfg.validate()?;
		let fft_size:usize = cfg.fft_size(code);
		let params = AcquisitionParams {
			prn, channel,
			system: code.system(),
			signal: code.signal(),
			fs_hz: cfg.fs_hz,
			if_hz: cfg.if_hz,
			fft_size,
			bounds: cfg.doppler_bounds(),
			max_dwells: cfg.effective_max_dwells(),
			threshold: cfg.threshold_for(channel, fft_size),
			dump_dir: if cfg.dump { Some(cfg.dump_dir.clone()) } else { None },
		};

		let mut acq = Self::from_params(params, assistance)?;
		let one_period = code.sampled(prn, cfg.fs_hz)?;
		acq.set_local_code(&one_period)?;
		Ok(acq)
	}

	/// Builds an instance without a local code; `set_local_code` or `set_local_code_spectrum` must follow
	pub fn from_params(params:AcquisitionParams, assistance:Arc<dyn AssistanceSource + Send + Sync>) -> Result<Self, Error> {
		params.bounds.validate()?;
		if params.fft_size == 0 { return Err(Error::InvalidConfig("FFT size must be positive")); }
		if params.max_dwells == 0 { return Err(Error::InvalidConfig("at least one dwell is required")); }
		if !(params.fs_hz > 0.0) { return Err(Error::InvalidConfig("sample rate must be positive")); }

		log::debug!("PRN {} on channel {}: FFT size {}, {} dwells, threshold {:.6}",
			params.prn, params.channel, params.fft_size, params.max_dwells, params.threshold);

		let kernel = CorrelationKernel::new(params.fft_size);
		Ok(Self { params, context: AcquisitionContext::default(), active: false, kernel, grid: None, assistance, sink: None })
	}

	pub fn with_sink(mut self, sink:Box<dyn ResultSink + Send>) -> Self {
		self.sink = Some(sink);
		self
	}

	/// Takes one or more whole code periods and repeats them to fill the FFT window
	pub fn set_local_code(&mut self, code:&[Complex<f64>]) -> Result<(), Error> {
		let n = self.params.fft_size;
		if code.is_empty() || n % code.len() != 0 {
			return Err(Error::LocalCodeLength{ expected: n, got: code.len() });
		}
		let replica:Vec<Complex<f64>> = code.iter().cycle().take(n).cloned().collect();
		self.kernel.set_local_code(&replica)
	}

	pub fn set_local_code_spectrum(&mut self, code_spectrum_conj:Vec<Complex<f64>>) -> Result<(), Error> {
		self.kernel.set_local_code_spectrum(code_spectrum_conj)
	}

	/// Back to a clean StandBy; the sample counter starts over
	pub fn init(&mut self) {
		self.release_grid();
		self.active = false;
		self.context = AcquisitionContext::default();
	}

	pub fn activate(&mut self) { self.set_active(true); }

	pub fn set_active(&mut self, active:bool) {
		if !active {
			self.deactivate();
			return;
		}
		if self.context.state != State::StandBy {
			log::warn!("PRN {}: activation ignored in state {:?}", self.params.prn, self.context.state);
			return;
		}
		self.context.well_count = 0;
		self.context.disable_assist = false;
		self.context.test_statistic = 0.0;
		self.context.input_power = 0.0;
		self.active = true;
		log::debug!("PRN {}: acquisition activated on channel {}", self.params.prn, self.params.channel);
	}

	/// Valid from any state; drops whatever grid is held
	pub fn deactivate(&mut self) {
		let (next, effect) = transition(self.context.state, Event::Deactivated);
		self.context.state = next;
		self.apply_effect(effect);
	}

	/// Samples wanted for the next step
	pub fn forecast(&self) -> usize { self.params.fft_size }

	/// Consumes one window.  Every window counts toward the sample counter, whatever the state.
	pub fn step(&mut self, window:&[Complex<f64>]) -> Result<Option<AcquisitionReport>, Error> {
		let window_start:usize = self.context.sample_counter;
		self.context.sample_counter += window.len();

		match self.advance(window, window_start) {
			Ok(report) => Ok(report),
			Err(e) => {
				log::warn!("PRN {}: acquisition aborted in state {:?}: {}", self.params.prn, self.context.state, e);
				self.release_grid();
				self.active = false;
				self.context.state = State::StandBy;
				Err(e)
			}
		}
	}

	pub fn state(&self) -> State { self.context.state }
	pub fn is_active(&self) -> bool { self.active }
	pub fn context(&self) -> &AcquisitionContext { &self.context }
	pub fn params(&self) -> &AcquisitionParams { &self.params }
	pub fn threshold(&self) -> f64 { self.params.threshold }
	pub fn sample_counter(&self) -> usize { self.context.sample_counter }
	pub fn grid(&self) -> Option<&SearchGrid> { self.grid.as_ref() }

	pub fn grid_hypotheses(&self) -> Vec<DopplerHypothesis> {
		match &self.grid {
			Some(grid) => grid.hypotheses().collect(),
			None => vec![],
		}
	}

	fn advance(&mut self, window:&[Complex<f64>], window_start:usize) -> Result<Option<AcquisitionReport>, Error> {
		let event:Event = match self.context.state {
			State::StandBy => if self.active { Event::Activated } else { Event::Idle },
			State::GetAssist => {
				let bounds = self.assisted_bounds();
				self.redefine_grid(bounds)?;
				Event::GridDefined
			},
			State::ComputeGrid => {
				let grid = self.grid.as_mut().ok_or(Error::GridUndefined)?;
				self.kernel.accumulate_dwell(window, grid)?;
				self.context.well_count = grid.well_count();
				log::debug!("PRN {}: dwell {} of {}", self.params.prn, self.context.well_count, self.params.max_dwells);
				Event::DwellAccumulated{ complete: self.context.well_count >= self.params.max_dwells }
			},
			State::Decide => {
				self.decide(window, window_start)?;
				if self.context.test_statistic > self.params.threshold {
					Event::AboveThreshold
				} else {
					Event::BelowThreshold{ assist_disabled: self.context.disable_assist }
				}
			},
			State::RedefineGrid => {
				self.redefine_grid(self.params.bounds)?;
				Event::GridDefined
			},
			State::PositiveAcq | State::NegativeAcq => Event::Reported,
		};

		let (next, effect) = transition(self.context.state, event);
		self.context.state = next;
		Ok(self.apply_effect(effect))
	}

	fn assisted_bounds(&mut self) -> DopplerBounds {
		let prn = self.params.prn;
		match self.assistance.read(prn) {
			Some(record) => {
				let bounds = record.search_bounds(self.params.bounds.step_hz);
				match bounds.validate() {
					Ok(()) => {
						log::info!("PRN {}: assisted search from {} to {} [Hz]", prn, bounds.min_hz, bounds.max_hz);
						self.context.disable_assist = false;
						bounds
					},
					Err(e) => {
						log::warn!("PRN {}: unusable assistance ({}), searching the full range", prn, e);
						self.context.disable_assist = true;
						self.params.bounds
					}
				}
			},
			None => {
				log::info!("PRN {}: no assistance, searching the full range", prn);
				self.context.disable_assist = true;
				self.params.bounds
			}
		}
	}

	fn redefine_grid(&mut self, bounds:DopplerBounds) -> Result<(), Error> {
		self.release_grid();
		let mut grid = SearchGrid::new(bounds, self.params.fs_hz, self.params.if_hz, self.params.fft_size)?;
		grid.reset();
		self.context.well_count = 0;
		self.grid = Some(grid);
		Ok(())
	}

	fn release_grid(&mut self) {
		if let Some(grid) = self.grid.take() {
			grid.release();
		}
		self.context.well_count = 0;
	}

	fn decide(&mut self, window:&[Complex<f64>], window_start:usize) -> Result<(), Error> {
		let grid = self.grid.as_ref().ok_or(Error::GridUndefined)?;

		let input_power = peak::estimate_power(window);
		let detection = peak::detect(grid, input_power);

		self.context.input_power    = input_power;
		self.context.test_statistic = detection.test_statistic;
		self.context.delay_samples  = detection.delay_samples;
		self.context.doppler_hz     = detection.doppler_hz;
		self.context.sample_stamp   = window_start;

		log::debug!("PRN {}: peak at delay {} [samples], Doppler {} [Hz], test statistic {:.3} vs threshold {:.3}",
			self.params.prn, detection.delay_samples, detection.doppler_hz, detection.test_statistic, self.params.threshold);

		if let Some(dir) = &self.params.dump_dir {
			dump::dump_energy_row(dir, self.params.system, self.params.signal, self.params.prn,
				detection.doppler_hz, grid.energy_row(detection.peak.doppler_index));
		}

		Ok(())
	}

	fn apply_effect(&mut self, effect:Effect) -> Option<AcquisitionReport> {
		match effect {
			Effect::None => None,
			Effect::DisableAssist => {
				log::info!("PRN {}: assisted search failed, falling back to the full range", self.params.prn);
				self.context.disable_assist = true;
				None
			},
			Effect::PublishPositive => Some(self.publish(Outcome::Positive)),
			Effect::PublishNegative => Some(self.publish(Outcome::Negative)),
			Effect::ReleaseGrid => {
				self.release_grid();
				self.active = false;
				None
			},
		}
	}

	fn publish(&mut self, outcome:Outcome) -> AcquisitionReport {
		let result = match outcome {
			Outcome::Positive => Some(AcquisitionResult {
				delay_samples: self.context.delay_samples,
				doppler_hz: self.context.doppler_hz,
				sample_stamp: self.context.sample_stamp,
				test_statistic: self.context.test_statistic,
				input_power: self.context.input_power,
			}),
			Outcome::Negative => None,
		};
		let report = AcquisitionReport {
			prn: self.params.prn,
			channel: self.params.channel,
			outcome,
			test_statistic: self.context.test_statistic,
			threshold: self.params.threshold,
			result,
		};

		match outcome {
			Outcome::Positive => log::info!("PRN {}: positive acquisition, delay {} [samples], Doppler {} [Hz]",
				self.params.prn, self.context.delay_samples, self.context.doppler_hz),
			Outcome::Negative => log::info!("PRN {}: negative acquisition, test statistic {:.3}", self.params.prn, self.context.test_statistic),
		}

		if let Some(sink) = &self.sink {
			sink.notify(&report);
		}
		self.release_grid();
		self.active = false;
		report
	}

}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionControl {
	Activate,
	Deactivate,
	Query,
}

impl BlockFunctionality<AcquisitionControl, bool, SampleWindow, AcquisitionReport> for Acquisition {

	// Replies with whether the instance is active afterward
	fn control(&mut self, control:&AcquisitionControl) -> Result<bool, Error> {
		match control {
			AcquisitionControl::Activate => self.activate(),
			AcquisitionControl::Deactivate => self.deactivate(),
			AcquisitionControl::Query => (),
		}
		Ok(self.active)
	}

	fn apply(&mut self, input:&SampleWindow) -> BlockResult<AcquisitionReport> {
		match self.step(input) {
			Ok(Some(report)) => BlockResult::Ready(report),
			Ok(None) => BlockResult::NotReady,
			Err(e) => BlockResult::Err(e),
		}
	}

}
