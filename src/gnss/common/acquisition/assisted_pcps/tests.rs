
use std::f64::consts;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use rustfft::num_complex::Complex;

use super::*;
use crate::block::Block;
use crate::gnss::common::acquisition::assistance::{AssistanceMap, AssistanceRecord, NoAssistance};
use crate::gnss::common::acquisition::threshold;
use crate::gnss::gps_l1_ca::signal_modulation::L1Ca;

const FS:f64 = 4.0e6;
const N:usize = 4000;

struct CountingAssistance {
	record:Option<AssistanceRecord>,
	reads:AtomicUsize,
}

impl AssistanceSource for CountingAssistance {
	fn read(&self, _prn:usize) -> Option<AssistanceRecord> {
		self.reads.fetch_add(1, Ordering::SeqCst);
		self.record
	}
}

/// Code for `prn` delayed by `delay` samples on a carrier at `doppler_hz`, starting at stream index `start`
fn signal_window(prn:usize, delay:usize, doppler_hz:f64, start:usize) -> Vec<Complex<f64>> {
	let code = L1Ca.sampled(prn, FS).unwrap();
	(0..N).map(|n| {
		let phase = 2.0 * consts::PI * doppler_hz * ((start + n) as f64) / FS;
		code[(n + N - delay) % N] * Complex{ re: phase.cos(), im: phase.sin() }
	}).collect()
}

fn noise_window(rng:&mut StdRng, sigma:f64) -> Vec<Complex<f64>> {
	let normal = Normal::new(0.0, sigma).unwrap();
	(0..N).map(|_| Complex{ re: normal.sample(rng), im: normal.sample(rng) }).collect()
}

fn acquisition(cfg:&AcquisitionConfig, prn:usize, assistance:Arc<dyn AssistanceSource + Send + Sync>) -> Acquisition {
	Acquisition::new(cfg, prn, 0, &L1Ca, assistance).unwrap()
}

/// Steps until a report comes out, returning it with the number of windows it took
fn run_until_report<F: FnMut(usize) -> Vec<Complex<f64>>>(acq:&mut Acquisition, limit:usize, mut next_window:F) -> (AcquisitionReport, usize) {
	for idx in 0..limit {
		let window = next_window(idx);
		if let Some(report) = acq.step(&window).unwrap() {
			return (report, idx + 1);
		}
	}
	panic!("No report after {} windows, state {:?}", limit, acq.state());
}

#[test]
fn pure_code_is_acquired_at_zero_delay_and_doppler() {
	let mut cfg = AcquisitionConfig::default();
	cfg.pfa = 0.001;
	let mut acq = acquisition(&cfg, 1, Arc::new(NoAssistance));
	assert_eq!(acq.forecast(), N);

	let expected_threshold = threshold::threshold(0.001, &DopplerBounds::new(-5000.0, 5000.0, 500.0), N);
	assert!((acq.threshold() - expected_threshold).abs() < 1.0e-12);

	let window = L1Ca.sampled(1, FS).unwrap();
	acq.activate();
	let (report, windows) = run_until_report(&mut acq, 10, |_| window.clone());

	assert_eq!(windows, cfg.max_dwells + 4);
	assert_eq!(report.outcome, Outcome::Positive);
	let result = report.result.unwrap();
	assert_eq!(result.delay_samples, 0);
	assert_eq!(result.doppler_hz, 0.0);
	assert!((result.input_power - 1.0).abs() < 1.0e-12);
	// Perfect match: 2 * N * 1 / (1 * 1)
	assert!((result.test_statistic - 8000.0).abs() < 1.0e-6);
	assert!(result.test_statistic > 1000.0 * acq.threshold());
	// Decided on the fourth window
	assert_eq!(result.sample_stamp, 3 * N);

	assert_eq!(acq.state(), State::StandBy);
	assert!(!acq.is_active());
	assert!(acq.grid().is_none());
}

#[test]
fn noisy_signal_recovers_delay_and_doppler() {
	let mut cfg = AcquisitionConfig::default();
	cfg.pfa = 0.001;
	cfg.max_dwells = 2;
	let mut acq = acquisition(&cfg, 7, Arc::new(NoAssistance));
	let mut rng = StdRng::seed_from_u64(1234);

	acq.activate();
	let (report, _) = run_until_report(&mut acq, 12, |idx| {
		let signal = signal_window(7, 1234, 1500.0, idx * N);
		let noise = noise_window(&mut rng, 1.0);
		signal.iter().zip(noise.iter()).map(|(s, n)| s + n).collect()
	});

	assert_eq!(report.outcome, Outcome::Positive);
	let result = report.result.unwrap();
	assert!((result.delay_samples as i64 - 1234).abs() <= 1, "delay {}", result.delay_samples);
	assert!((result.doppler_hz - 1500.0).abs() <= 250.0, "doppler {}", result.doppler_hz);
	assert!(result.test_statistic > report.threshold);
}

#[test]
fn intermediate_frequency_is_removed_before_reporting() {
	let mut cfg = AcquisitionConfig::default();
	cfg.if_hz = 20.0e3;
	let mut acq = acquisition(&cfg, 3, Arc::new(NoAssistance));

	acq.activate();
	let (report, _) = run_until_report(&mut acq, 10, |idx| signal_window(3, 250, 20.0e3 - 2000.0, idx * N));
	let result = report.result.unwrap();
	assert_eq!(result.doppler_hz, -2000.0);
	assert_eq!(result.delay_samples, 250);
}

#[test]
fn assistance_miss_still_finishes_on_noise() {
	let mut cfg = AcquisitionConfig::default();
	cfg.max_dwells = 3;
	cfg.threshold = 100.0;
	let mut acq = acquisition(&cfg, 11, Arc::new(NoAssistance));
	let mut rng = StdRng::seed_from_u64(99);

	acq.activate();
	let (report, windows) = run_until_report(&mut acq, cfg.max_dwells + 4, |_| noise_window(&mut rng, 1.0));
	assert_eq!(windows, cfg.max_dwells + 4);
	assert_eq!(report.outcome, Outcome::Negative);
	assert!(report.result.is_none());
	assert!(report.test_statistic < 100.0);
	assert!(acq.context().disable_assist);
	assert_eq!(acq.state(), State::StandBy);
	assert!(acq.grid().is_none());
}

#[test]
fn zero_input_is_negative_not_nan() {
	let cfg = AcquisitionConfig::default();
	let mut acq = acquisition(&cfg, 2, Arc::new(NoAssistance));
	acq.activate();
	let (report, _) = run_until_report(&mut acq, 10, |_| vec![Complex{ re: 0.0, im: 0.0 }; N]);
	assert_eq!(report.outcome, Outcome::Negative);
	assert_eq!(report.test_statistic, 0.0);
}

#[test]
fn failed_assisted_search_widens_once_without_new_assistance() {
	let mut cfg = AcquisitionConfig::default();
	// Off-Doppler code sidelobes in the assisted grid reach a few tens
	cfg.threshold = 1000.0;
	let assistance = Arc::new(CountingAssistance {
		record: Some(AssistanceRecord{ doppler_hz: -3000.0, doppler_uncertainty_hz: 100.0 }),
		reads: AtomicUsize::new(0),
	});
	let mut acq = Acquisition::new(&cfg, 9, 0, &L1Ca, assistance.clone()).unwrap();

	acq.activate();
	let mut states:Vec<State> = vec![];
	let mut grid_sizes:Vec<usize> = vec![];
	let mut report:Option<AcquisitionReport> = None;
	for idx in 0..12 {
		report = acq.step(&signal_window(9, 500, 3000.0, idx * N)).unwrap();
		states.push(acq.state());
		grid_sizes.push(acq.grid_hypotheses().len());
		if report.is_some() { break; }
	}

	assert_eq!(states, vec![State::GetAssist, State::ComputeGrid, State::Decide, State::RedefineGrid,
		State::ComputeGrid, State::Decide, State::PositiveAcq, State::StandBy]);
	// Assisted grid is -4000 to -2000, the fallback is the configured range
	assert_eq!(grid_sizes[1], 4);
	assert_eq!(grid_sizes[4], 20);
	assert_eq!(assistance.reads.load(Ordering::SeqCst), 1);

	let result = report.unwrap().result.unwrap();
	assert_eq!(result.doppler_hz, 3000.0);
	assert_eq!(result.delay_samples, 500);
}

#[test]
fn good_assistance_is_used_directly() {
	let cfg = AcquisitionConfig::default();
	let map = AssistanceMap::new();
	map.write(4, AssistanceRecord{ doppler_hz: 2000.0, doppler_uncertainty_hz: 1500.0 });
	let mut acq = acquisition(&cfg, 4, Arc::new(map));

	acq.activate();
	acq.step(&signal_window(4, 0, 1500.0, 0)).unwrap();
	acq.step(&signal_window(4, 0, 1500.0, N)).unwrap();
	assert_eq!(acq.state(), State::ComputeGrid);
	assert!(!acq.context().disable_assist);
	let hypotheses = acq.grid_hypotheses();
	assert_eq!(hypotheses.len(), 12);
	assert_eq!(hypotheses[0].frequency_hz, -1000.0);

	let (report, _) = run_until_report(&mut acq, 10, |idx| signal_window(4, 0, 1500.0, (idx + 2) * N));
	assert_eq!(report.result.unwrap().doppler_hz, 1500.0);
}

#[test]
fn deactivate_releases_grid_from_any_state() {
	let cfg = AcquisitionConfig::default();
	let window = L1Ca.sampled(5, FS).unwrap();

	for steps in 0..5 {
		let mut acq = acquisition(&cfg, 5, Arc::new(NoAssistance));
		acq.activate();
		for _ in 0..steps {
			acq.step(&window).unwrap();
		}
		if steps >= 2 && steps <= 3 {
			assert!(acq.grid().is_some());
		}
		acq.deactivate();
		assert_eq!(acq.state(), State::StandBy);
		assert!(!acq.is_active());
		assert!(acq.grid().is_none());
		assert_eq!(acq.context().well_count, 0);

		// Nothing more happens until the next activation
		assert!(acq.step(&window).unwrap().is_none());
		assert_eq!(acq.state(), State::StandBy);
	}
}

#[test]
fn standby_consumes_everything_it_is_given() {
	let cfg = AcquisitionConfig::default();
	let mut acq = acquisition(&cfg, 6, Arc::new(NoAssistance));

	let mut total:usize = 0;
	for len in &[N, 10, 0, 3 * N, 7] {
		assert!(acq.step(&vec![Complex{ re: 1.0, im: 0.0 }; *len]).unwrap().is_none());
		total += len;
		assert_eq!(acq.sample_counter(), total);
		assert_eq!(acq.state(), State::StandBy);
	}

	acq.init();
	assert_eq!(acq.sample_counter(), 0);
}

#[test]
fn short_window_during_dwell_aborts_to_standby() {
	let cfg = AcquisitionConfig::default();
	let mut acq = acquisition(&cfg, 8, Arc::new(NoAssistance));
	let window = L1Ca.sampled(8, FS).unwrap();

	acq.activate();
	acq.step(&window).unwrap();
	acq.step(&window).unwrap();
	assert_eq!(acq.state(), State::ComputeGrid);

	match acq.step(&window[..100]) {
		Err(Error::WindowLength{ expected, got }) => assert_eq!((expected, got), (N, 100)),
		other => panic!("Unexpected result: {:?}", other),
	}
	assert_eq!(acq.sample_counter(), 2 * N + 100);
	assert_eq!(acq.state(), State::StandBy);
	assert!(!acq.is_active());
	assert!(acq.grid().is_none());
}

#[test]
fn reports_reach_the_sink() {
	let cfg = AcquisitionConfig::default();
	let (tx, rx) = mpsc::channel::<AcquisitionReport>();
	let mut acq = acquisition(&cfg, 10, Arc::new(NoAssistance)).with_sink(Box::new(tx));

	let window = L1Ca.sampled(10, FS).unwrap();
	acq.activate();
	let (report, _) = run_until_report(&mut acq, 10, |_| window.clone());

	assert_eq!(rx.try_recv().unwrap(), report);
	assert!(rx.try_recv().is_err());
}

#[test]
fn decision_dumps_winning_row() {
	let dir = tempfile::tempdir().unwrap();
	let mut cfg = AcquisitionConfig::default();
	cfg.dump = true;
	cfg.dump_dir = dir.path().to_path_buf();
	let mut acq = acquisition(&cfg, 12, Arc::new(NoAssistance));

	acq.activate();
	run_until_report(&mut acq, 10, |idx| signal_window(12, 0, -500.0, idx * N));

	let path = dir.path().join("test_statistics_G_1C_sat_12_doppler_-500.dat");
	assert_eq!(std::fs::metadata(&path).unwrap().len(), (4 * N) as u64);
}

#[test]
fn local_code_must_tile_the_window() {
	let params = AcquisitionParams {
		prn: 1, channel: 0, system: "G", signal: "1C", fs_hz: FS, if_hz: 0.0, fft_size: N,
		bounds: DopplerBounds::new(-1000.0, 1000.0, 500.0), max_dwells: 1, threshold: 40.0, dump_dir: None,
	};
	let mut acq = Acquisition::from_params(params.clone(), Arc::new(NoAssistance)).unwrap();
	assert!(acq.set_local_code(&vec![Complex{ re: 1.0, im: 0.0 }; 3000]).is_err());
	assert!(acq.set_local_code(&vec![Complex{ re: 1.0, im: 0.0 }; 1000]).is_ok());
	assert!(acq.set_local_code_spectrum(vec![Complex{ re: 1.0, im: 0.0 }; 10]).is_err());

	// Missing code surfaces on the first dwell
	let mut bare = Acquisition::from_params(params, Arc::new(NoAssistance)).unwrap();
	bare.activate();
	bare.step(&vec![Complex{ re: 0.0, im: 0.0 }; N]).unwrap();
	bare.step(&vec![Complex{ re: 0.0, im: 0.0 }; N]).unwrap();
	match bare.step(&vec![Complex{ re: 0.0, im: 0.0 }; N]) {
		Err(Error::LocalCodeMissing) => (),
		other => panic!("Unexpected result: {:?}", other),
	}
}

#[test]
fn bad_configuration_refuses_to_start() {
	let mut cfg = AcquisitionConfig::default();
	cfg.item_type = "ibyte".to_string();
	assert!(Acquisition::new(&cfg, 1, 0, &L1Ca, Arc::new(NoAssistance)).is_err());

	let cfg = AcquisitionConfig::default();
	match Acquisition::new(&cfg, 40, 0, &L1Ca, Arc::new(NoAssistance)) {
		Err(Error::InvalidPrn(40)) => (),
		Err(e) => panic!("Unexpected error: {}", e),
		Ok(_) => panic!("PRN 40 should be rejected"),
	}
}

#[test]
fn transition_table() {
	use State::*;

	assert_eq!(transition(StandBy, Event::Idle), (StandBy, Effect::None));
	assert_eq!(transition(StandBy, Event::Activated), (GetAssist, Effect::None));
	assert_eq!(transition(GetAssist, Event::GridDefined), (ComputeGrid, Effect::None));
	assert_eq!(transition(ComputeGrid, Event::DwellAccumulated{ complete: false }), (ComputeGrid, Effect::None));
	assert_eq!(transition(ComputeGrid, Event::DwellAccumulated{ complete: true }), (Decide, Effect::None));
	assert_eq!(transition(Decide, Event::AboveThreshold), (PositiveAcq, Effect::None));
	assert_eq!(transition(Decide, Event::BelowThreshold{ assist_disabled: false }), (RedefineGrid, Effect::DisableAssist));
	assert_eq!(transition(Decide, Event::BelowThreshold{ assist_disabled: true }), (NegativeAcq, Effect::None));
	assert_eq!(transition(RedefineGrid, Event::GridDefined), (ComputeGrid, Effect::None));
	assert_eq!(transition(PositiveAcq, Event::Reported), (StandBy, Effect::PublishPositive));
	assert_eq!(transition(NegativeAcq, Event::Reported), (StandBy, Effect::PublishNegative));

	for state in &[StandBy, GetAssist, ComputeGrid, Decide, RedefineGrid, PositiveAcq, NegativeAcq] {
		assert_eq!(transition(*state, Event::Deactivated), (StandBy, Effect::ReleaseGrid));
	}

	// Events that don't belong to a state leave it alone
	assert_eq!(transition(Decide, Event::GridDefined), (Decide, Effect::None));
	assert_eq!(transition(StandBy, Event::Reported), (StandBy, Effect::None));
}

#[tokio::test(threaded_scheduler)]
async fn runs_as_a_block() {
	let cfg = AcquisitionConfig::default();
	let acq = acquisition(&cfg, 14, Arc::new(NoAssistance));
	let mut block = Block::from(acq);

	block.tx_control.send(AcquisitionControl::Activate).await.unwrap();
	for idx in 0..8 {
		let window = SampleWindow::new(signal_window(14, 321, 1000.0, idx * N), idx * N);
		block.tx_input.send(window).await.unwrap();
	}

	let reports = block.shutdown().await.unwrap();
	assert_eq!(reports.len(), 1);
	assert_eq!(reports[0].outcome, Outcome::Positive);
	let result = reports[0].result.unwrap();
	assert_eq!(result.delay_samples, 321);
	assert_eq!(result.doppler_hz, 1000.0);
}
