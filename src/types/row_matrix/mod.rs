use crate::Error;

/// Dense row-major matrix whose shape is fixed when it's allocated.  The row count and row length
/// live together with the storage, so a matrix is always replaced as a whole rather than resized.
#[derive(Debug, Clone, PartialEq)]
pub struct RowMatrix<T> {
	rows: usize,
	cols: usize,
	data: Vec<T>,
}

impl<T: Clone> RowMatrix<T> {

	/// Allocates `rows x cols` copies of `fill`, reporting overflow or allocation failure instead of aborting
	pub fn filled(rows:usize, cols:usize, fill:T) -> Result<Self, Error> {
		let len:usize = rows.checked_mul(cols).ok_or(Error::Allocation)?;
		let mut data:Vec<T> = Vec::new();
		data.try_reserve_exact(len).map_err(|_| Error::Allocation)?;
		data.resize(len, fill);
		Ok(Self{ rows, cols, data })
	}

	pub fn fill(&mut self, value:T) {
		for x in self.data.iter_mut() { *x = value.clone(); }
	}

}

impl<T> RowMatrix<T> {

	pub fn rows(&self) -> usize { self.rows }
	pub fn cols(&self) -> usize { self.cols }

	pub fn row(&self, idx:usize) -> &[T] {
		&self.data[(idx*self.cols)..((idx+1)*self.cols)]
	}

	pub fn row_mut(&mut self, idx:usize) -> &mut [T] {
		&mut self.data[(idx*self.cols)..((idx+1)*self.cols)]
	}

	pub fn iter_rows(&self) -> impl Iterator<Item = &[T]> {
		(0..self.rows).map(move |idx| self.row(idx))
	}

	pub fn as_slice(&self) -> &[T] { &self.data }

}
