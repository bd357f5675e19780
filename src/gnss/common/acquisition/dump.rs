use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};

use crate::Error;

pub fn dump_filename(system:&str, signal:&str, prn:usize, doppler_hz:f64) -> String {
	format!("test_statistics_{}_{}_sat_{}_doppler_{}.dat", system, signal, prn, doppler_hz.round() as i64)
}

/// Writes one energy row as little-endian f32 values and returns where it went
pub fn write_energy_row(dir:&Path, system:&str, signal:&str, prn:usize, doppler_hz:f64, row:&[f64]) -> Result<PathBuf, Error> {
	fs::create_dir_all(dir)?;
	let path = dir.join(dump_filename(system, signal, prn, doppler_hz));
	let mut out = BufWriter::new(File::create(&path)?);
	for x in row {
		out.write_f32::<LittleEndian>(*x as f32)?;
	}
	out.flush()?;
	Ok(path)
}

/// Diagnostic only, so a failed write is logged and otherwise ignored
pub fn dump_energy_row(dir:&Path, system:&str, signal:&str, prn:usize, doppler_hz:f64, row:&[f64]) {
	match write_energy_row(dir, system, signal, prn, doppler_hz, row) {
		Ok(path) => log::debug!("Dumped {} test statistics to {}", row.len(), path.display()),
		Err(e)   => log::warn!("Unable to dump test statistics for PRN {}: {}", prn, e),
	}
}
