use std::io::{ErrorKind, Read};
use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use rustfft::num_complex::Complex;

use crate::{Error, Sample};

pub const BUFFER_SIZE:usize = 2048;

/// On-disk representation of one complex baseband sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
	/// Interleaved little-endian f32 I/Q
	GrComplex,
	/// Interleaved little-endian i16 I/Q
	CShort,
}

impl ItemType {

	pub fn size_bytes(&self) -> usize { match self {
		ItemType::GrComplex => 8,
		ItemType::CShort    => 4,
	}}

	fn decode(&self, b:&[u8]) -> Complex<f64> { match self {
		ItemType::GrComplex => Complex{ re: LittleEndian::read_f32(&b[0..4]) as f64, im: LittleEndian::read_f32(&b[4..8]) as f64 },
		ItemType::CShort    => Complex{ re: LittleEndian::read_i16(&b[0..2]) as f64, im: LittleEndian::read_i16(&b[2..4]) as f64 },
	}}

}

impl FromStr for ItemType {
	type Err = Error;

	fn from_str(s:&str) -> Result<Self, Error> { match s {
		"gr_complex" => Ok(ItemType::GrComplex),
		"cshort"     => Ok(ItemType::CShort),
		other => Err(Error::UnsupportedItemType(other.to_string())),
	}}
}

/// Turns a byte stream of interleaved I/Q values into indexed samples
pub struct ComplexSource<R: Read> {
	src: R,
	item_type: ItemType,
	idx: usize,
	bytes: Vec<u8>,
	buffer: Vec<Complex<f64>>,
	buffer_idx: usize,
}

impl<R: Read> ComplexSource<R> {

	pub fn new(src:R, item_type:ItemType) -> Self {
		Self { src, item_type, idx: 0, bytes: vec![], buffer: Vec::with_capacity(BUFFER_SIZE), buffer_idx: 0 }
	}

	// Returns the number of bytes read; zero means the source is exhausted
	fn buffer_samples(&mut self) -> Result<usize, Error> {
		let item_size = self.item_type.size_bytes();
		let carry = self.bytes.len();
		self.bytes.resize(carry + BUFFER_SIZE*item_size, 0);

		let bytes_read:usize = loop {
			match self.src.read(&mut self.bytes[carry..]) {
				Ok(n) => break n,
				Err(e) if e.kind() == ErrorKind::Interrupted => continue,
				Err(e) => {
					self.bytes.truncate(carry);
					return Err(e.into());
				}
			}
		};
		self.bytes.truncate(carry + bytes_read);

		// A trailing partial sample stays in the byte buffer until the rest of it arrives
		let whole:usize = (self.bytes.len() / item_size) * item_size;
		let item_type = self.item_type;
		self.buffer.clear();
		self.buffer.extend(self.bytes[..whole].chunks(item_size).map(|b| item_type.decode(b)));
		self.bytes.drain(..whole);
		self.buffer_idx = 0;

		Ok(bytes_read)
	}

}

impl<R: Read> Iterator for ComplexSource<R> {
	type Item = Sample;

	fn next(&mut self) -> Option<Sample> {
		while self.buffer_idx >= self.buffer.len() {
			match self.buffer_samples() {
				Ok(0)  => return None,
				Ok(_)  => (),
				Err(e) => {
					log::warn!("Stopping sample source after read failure: {}", e);
					return None;
				}
			}
		}

		let ans = Sample{ val: self.buffer[self.buffer_idx], idx: self.idx };
		self.idx += 1;
		self.buffer_idx += 1;
		Some(ans)
	}
}

/// Fixed-length run of consecutive samples, cheap to clone so one window can feed several channels
#[derive(Debug, Clone)]
pub struct SampleWindow {
	pub samples: Arc<Vec<Complex<f64>>>,
	pub start_idx: usize,
}

impl SampleWindow {

	pub fn new(samples:Vec<Complex<f64>>, start_idx:usize) -> Self {
		Self { samples: Arc::new(samples), start_idx }
	}

}

impl Deref for SampleWindow {
	type Target = [Complex<f64>];

	fn deref(&self) -> &[Complex<f64>] { &self.samples }
}

/// Pulls fixed-size windows out of a sample iterator
pub struct SampleStream<I: Iterator<Item = Sample>> {
	src: I,
}

impl<I: Iterator<Item = Sample>> SampleStream<I> {

	pub fn new(src:I) -> Self { Self { src } }

	/// Either a full window of `n` samples or `None` at end of stream; a trailing partial window is dropped
	pub fn pull(&mut self, n:usize) -> Option<SampleWindow> {
		let mut samples:Vec<Complex<f64>> = Vec::with_capacity(n);
		let mut start_idx:Option<usize> = None;
		while samples.len() < n {
			let s = self.src.next()?;
			start_idx.get_or_insert(s.idx);
			samples.push(s.val);
		}
		Some(SampleWindow::new(samples, start_idx.unwrap_or(0)))
	}

}

#[cfg(test)]
mod tests {

	use std::io::Cursor;

	use byteorder::{LittleEndian, WriteBytesExt};
	use rustfft::num_complex::Complex;

	use crate::Error;
	use super::{ComplexSource, ItemType, SampleStream};

	#[test]
	fn decodes_interleaved_i16() {
		let mut bytes:Vec<u8> = vec![];
		for v in &[1i16, -2, 300, -400, 5, 6] {
			bytes.write_i16::<LittleEndian>(*v).unwrap();
		}

		let samples:Vec<_> = ComplexSource::new(Cursor::new(bytes), ItemType::CShort).collect();
		assert_eq!(samples.len(), 3);
		assert_eq!(samples[1].val, Complex{ re: 300.0, im: -400.0 });
		assert_eq!(samples[2].idx, 2);
	}

	#[test]
	fn decodes_interleaved_f32_and_drops_partial_sample() {
		let mut bytes:Vec<u8> = vec![];
		for v in &[0.5f32, -0.25, 1.0, 2.0] {
			bytes.write_f32::<LittleEndian>(*v).unwrap();
		}
		bytes.push(0xFF);

		let samples:Vec<_> = ComplexSource::new(Cursor::new(bytes), ItemType::GrComplex).collect();
		assert_eq!(samples.len(), 2);
		assert_eq!(samples[0].val, Complex{ re: 0.5, im: -0.25 });
	}

	#[test]
	fn unknown_item_type_is_rejected() {
		assert!("gr_complex".parse::<ItemType>().is_ok());
		assert!("cshort".parse::<ItemType>().is_ok());
		assert!("ishort".parse::<ItemType>().is_err());
		for alias in &["f32", "i16", "GR_COMPLEX", ""] {
			match alias.parse::<ItemType>() {
				Err(Error::UnsupportedItemType(s)) => assert_eq!(s.as_str(), *alias),
				other => panic!("{:?} parsed as {:?}", alias, other),
			}
		}
	}

	#[test]
	fn pull_returns_full_windows_then_end_of_stream() {
		let mut bytes:Vec<u8> = vec![];
		for v in 0..20i16 {
			bytes.write_i16::<LittleEndian>(v).unwrap();
		}

		// 10 samples: two full windows of 4, then a partial one
		let mut stream = SampleStream::new(ComplexSource::new(Cursor::new(bytes), ItemType::CShort));
		let first = stream.pull(4).unwrap();
		assert_eq!(first.len(), 4);
		assert_eq!(first.start_idx, 0);
		let second = stream.pull(4).unwrap();
		assert_eq!(second.start_idx, 4);
		assert_eq!(second[0], Complex{ re: 8.0, im: 9.0 });
		assert!(stream.pull(4).is_none());
	}

}
