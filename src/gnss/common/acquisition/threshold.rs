use super::grid::DopplerBounds;

/// Detection threshold for an overall false-alarm probability `pfa` across every cell of the grid.
///
/// Each noise-only cell is modeled as exponentially distributed with rate `fft_size` and the cells
/// are treated as independent, so the per-cell quantile is taken at (1 - pfa)^(1/ncells).  The Doppler
/// bins are counted over [min, max] with both ends included.  A `pfa` of zero has no quantile; callers
/// use their fixed threshold in that case.
pub fn threshold(pfa:f64, bounds:&DopplerBounds, fft_size:usize) -> f64 {
	let frequency_bins:usize = bounds.inclusive_bin_count();
	let ncells:f64 = (fft_size * frequency_bins) as f64;
	let lambda:f64 = fft_size as f64;

	// val = (1 - pfa)^(1/ncells); 1 - val is kept in expm1 form because it's tiny for realistic grids
	let one_minus_val:f64 = -((-pfa).ln_1p() / ncells).exp_m1();
	exponential_quantile_complement(one_minus_val, lambda)
}

/// Quantile of Exp(lambda) at probability 1 - q
fn exponential_quantile_complement(q:f64, lambda:f64) -> f64 {
	-q.ln() / lambda
}
