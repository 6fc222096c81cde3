//! Linear-interpolation resampling for display decimation.

use std::borrow::Cow;

/// Resample `input` to `target` points by linear interpolation.
///
/// - `target == 0` or empty input gives an empty result
/// - without `upsample`, a target at or above the input length borrows the
///   input unchanged
/// - `target == input.len()` gives a copy
/// - `target == 1` gives the middle element
///
/// Otherwise output point `i` sits at input position `i·(len-1)/(target-1)`,
/// so the first and last samples are kept exactly.
pub fn resample(input: &[f64], target: usize, upsample: bool) -> Cow<'_, [f64]> {
    let len = input.len();
    if target == 0 || len == 0 {
        return Cow::Owned(Vec::new());
    }
    if !upsample && target >= len {
        return Cow::Borrowed(input);
    }
    if target == len {
        return Cow::Owned(input.to_vec());
    }
    if target == 1 {
        return Cow::Owned(vec![input[(len - 1) / 2]]);
    }

    let last = len - 1;
    let step = last as f64 / (target - 1) as f64;
    let mut out: Vec<f64> = (0..target)
        .map(|i| {
            let pos = i as f64 * step;
            let lo = pos.floor() as usize;
            if lo >= last {
                input[last]
            } else {
                let frac = pos - lo as f64;
                input[lo] + (input[lo + 1] - input[lo]) * frac
            }
        })
        .collect();
    out[target - 1] = input[last];
    Cow::Owned(out)
}

/// Resample a time axis and its values together, downsampling only.
///
/// Both slices are truncated to the shorter length first.
pub fn resample_pair(times: &[f64], values: &[f64], target: usize) -> (Vec<f64>, Vec<f64>) {
    let len = times.len().min(values.len());
    (
        resample(&times[..len], target, false).into_owned(),
        resample(&values[..len], target, false).into_owned(),
    )
}
