
extern crate clap;
extern crate colored;
extern crate gnss_acq;
extern crate serde_json;
extern crate tokio;

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use clap::{Arg, App};
use colored::*;
use gnss_acq::Error;
use gnss_acq::block::Block;
use gnss_acq::io::{ComplexSource, SampleStream, SampleWindow};
use gnss_acq::gnss::common::acquisition::{AcquisitionReport, Outcome};
use gnss_acq::gnss::common::acquisition::assistance::{AssistanceMap, AssistanceSource, NoAssistance};
use gnss_acq::gnss::common::acquisition::assisted_pcps::{Acquisition, AcquisitionControl};
use gnss_acq::gnss::common::acquisition::config::AcquisitionConfig;
use gnss_acq::gnss::gps_l1_ca::{MAX_PRN, MIN_PRN};
use gnss_acq::gnss::gps_l1_ca::signal_modulation::L1Ca;

type AcquisitionBlock = Block<AcquisitionControl, SampleWindow, AcquisitionReport>;

fn parse_prns(s:&str) -> Result<Vec<usize>, Error> {
	s.split(',').map(|p| p.trim().parse::<usize>().map_err(|_| Error::InvalidConfig("PRNs must be a comma-separated list of integers"))).collect()
}

fn print_report(report:&AcquisitionReport) {
	match (report.outcome, report.result) {
		(Outcome::Positive, Some(result)) => {
			let result_str = format!("{:9.2} [Hz], {:6} [samples], {:10.3} test statistic at sample {}",
				result.doppler_hz, result.delay_samples, result.test_statistic, result.sample_stamp);
			eprintln!("PRN {:02} {}", report.prn, result_str.green());
		},
		_ => {
			let result_str = format!("not found, {:.3} test statistic vs {:.3} threshold", report.test_statistic, report.threshold);
			eprintln!("PRN {:02} {}", report.prn, result_str.yellow());
		}
	}
}

#[tokio::main]
async fn main() -> Result<(), Error> {

	env_logger::init();

	let matches = App::new("Assisted GPS L1 CA Acquisition")
		.version("0.1.0")
		.about("Takes IQ samples centered on 1575.42 MHz and runs assisted multi-dwell PCPS acquisition for each requested PRN")
		.arg(Arg::with_name("filename")
			.short("f").long("filename")
			.help("Input filename")
			.required(true).takes_value(true))
		.arg(Arg::with_name("input_type")
			.short("t").long("type")
			.help("Overrides the item type in the configuration")
			.takes_value(true)
			.possible_values(&["gr_complex", "cshort"]))
		.arg(Arg::with_name("config")
			.short("c").long("config")
			.help("Acquisition configuration (JSON)")
			.takes_value(true))
		.arg(Arg::with_name("assistance")
			.short("a").long("assistance")
			.help("Doppler assistance keyed by PRN (JSON)")
			.takes_value(true))
		.arg(Arg::with_name("prns")
			.short("p").long("prns")
			.help("Comma-separated PRNs, all of them if omitted")
			.takes_value(true))
		.arg(Arg::with_name("max_windows")
			.short("m").long("max_windows")
			.takes_value(true))
		.get_matches();

	let fname:&str = matches.value_of("filename").ok_or(Error::InvalidConfig("missing input filename"))?;

	let mut cfg:AcquisitionConfig = match matches.value_of("config") {
		Some(path) => AcquisitionConfig::from_json_file(path)?,
		None => AcquisitionConfig::default(),
	};
	if let Some(item_type) = matches.value_of("input_type") {
		cfg.item_type = item_type.to_string();
	}
	cfg.validate()?;

	let assistance:Arc<dyn AssistanceSource + Send + Sync> = match matches.value_of("assistance") {
		Some(path) => Arc::new(AssistanceMap::from_json_reader(BufReader::new(File::open(path)?))?),
		None => Arc::new(NoAssistance),
	};

	let prns:Vec<usize> = match matches.value_of("prns") {
		Some(s) => parse_prns(s)?,
		None => (MIN_PRN..=MAX_PRN).collect(),
	};

	let opt_max_windows:Option<usize> = match matches.value_of("max_windows") {
		Some(s) => Some(s.parse().map_err(|_| Error::InvalidConfig("max_windows must be an integer"))?),
		None => None,
	};

	let fft_size:usize = cfg.fft_size(&L1Ca);
	eprintln!("Decoding {} at {} [samples/sec], {} samples per window, {} PRNs, max_windows={:?}",
		&fname, cfg.fs_hz, fft_size, prns.len(), &opt_max_windows);

	let mut blocks:Vec<AcquisitionBlock> = vec![];
	for prn in prns.iter() {
		let acq = Acquisition::new(&cfg, *prn, blocks.len(), &L1Ca, assistance.clone())?;
		let mut block = Block::from(acq);
		block.tx_control.send(AcquisitionControl::Activate).await.map_err(|_| Error::ChannelClosed)?;
		blocks.push(block);
	}

	let src = ComplexSource::new(BufReader::new(File::open(fname)?), cfg.item_type()?);
	let mut stream = SampleStream::new(src);
	let mut all_reports:Vec<AcquisitionReport> = vec![];
	let mut num_windows:usize = 0;

	while let Some(window) = stream.pull(fft_size) {

		for block in blocks.iter_mut() {
			block.tx_input.send(window.clone()).await.map_err(|_| Error::ChannelClosed)?;
			while let Ok(report) = block.rx_output.try_recv() {
				print_report(&report);
				all_reports.push(report);
			}
		}

		num_windows += 1;
		if all_reports.len() >= blocks.len() { break; }
		if let Some(max_windows) = opt_max_windows {
			if num_windows >= max_windows { break; }
		}

	}

	for block in blocks {
		for report in block.shutdown().await? {
			print_report(&report);
			all_reports.push(report);
		}
	}

	eprintln!("{}", format!("Processed {} windows, {} reports", num_windows, all_reports.len()).blue());

	// Output data in JSON format
	println!("{}", serde_json::to_string_pretty(&all_reports)?);

	Ok(())
}
