//! Feature histograms.
//!
//! Every feature is mapped to a small number of bins once per fit. Numeric
//! features use quantile cut points, categorical features one bin per
//! distinct value. The last two bins of every feature hold values without a
//! bin (unseen categories) and missing values.

use ndarray::Array2;
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub(crate) struct BinMapper {
    pub(crate) categorical: bool,
    /// Upper bounds (numeric) or category values (categorical), ascending
    pub(crate) values: Vec<f64>,
}

impl BinMapper {
    fn numeric(column: &[f64], max_bins: usize) -> Self {
        let mut finite: Vec<f64> = column.iter().copied().filter(|v| v.is_finite()).collect();
        finite.sort_by(f64::total_cmp);
        let mut distinct = finite.clone();
        distinct.dedup();

        let values = if distinct.len() <= max_bins {
            distinct.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect()
        } else {
            let mut cuts: Vec<f64> = (1..max_bins)
                .map(|k| finite[k * finite.len() / max_bins])
                .collect();
            cuts.dedup();
            // the largest value needs a bin above the last cut
            if cuts.last().is_some_and(|c| Some(c) == finite.last()) {
                cuts.pop();
            }
            cuts
        };

        Self {
            categorical: false,
            values,
        }
    }

    fn categorical(column: &[f64], max_bins: usize) -> Self {
        let mut values: Vec<f64> = column.iter().copied().filter(|v| v.is_finite()).collect();
        values.sort_by(f64::total_cmp);
        let mut counts: Vec<(f64, usize)> = Vec::new();
        for v in values {
            match counts.last_mut() {
                Some((last, n)) if *last == v => *n += 1,
                _ => counts.push((v, 1)),
            }
        }
        // keep the most frequent categories when there are too many
        if counts.len() > max_bins {
            counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.total_cmp(&b.0)));
            counts.truncate(max_bins);
            counts.sort_by(|a, b| a.0.total_cmp(&b.0));
        }

        Self {
            categorical: true,
            values: counts.into_iter().map(|(v, _)| v).collect(),
        }
    }

    /// Bin of values not matching any category.
    pub(crate) fn other_bin(&self) -> usize {
        self.values.len()
    }

    /// Bin of missing values.
    pub(crate) fn missing_bin(&self) -> usize {
        self.values.len() + 1
    }

    pub(crate) fn n_bins(&self) -> usize {
        self.values.len() + 2
    }

    pub(crate) fn bin(&self, v: f64) -> usize {
        if v.is_nan() {
            return self.missing_bin();
        }
        if self.categorical {
            self.values
                .binary_search_by(|c| c.total_cmp(&v))
                .unwrap_or_else(|_| self.other_bin())
        } else {
            self.values.partition_point(|b| *b < v)
        }
    }
}

/// Column-major binned copy of a feature matrix.
#[derive(Debug)]
pub(crate) struct BinnedMatrix {
    pub(crate) mappers: Vec<BinMapper>,
    pub(crate) bins: Vec<Vec<u16>>,
}

impl BinnedMatrix {
    pub(crate) fn new(x: &Array2<f64>, categorical: &[usize], max_bins: usize) -> Self {
        let max_bins = max_bins.min(usize::from(u16::MAX) - 2);
        let (mappers, bins): (Vec<BinMapper>, Vec<Vec<u16>>) = (0..x.ncols())
            .into_par_iter()
            .map(|f| {
                let column: Vec<f64> = x.column(f).to_vec();
                let mapper = if categorical.contains(&f) {
                    BinMapper::categorical(&column, max_bins)
                } else {
                    BinMapper::numeric(&column, max_bins)
                };
                let bins = column.iter().map(|&v| mapper.bin(v) as u16).collect();
                (mapper, bins)
            })
            .unzip();
        Self { mappers, bins }
    }

    pub(crate) fn n_features(&self) -> usize {
        self.mappers.len()
    }
}
