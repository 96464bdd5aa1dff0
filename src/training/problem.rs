//! Read-only view of the binned training dataset.
//!
//! A [`BinnedProblem`] is the hand-off contract with the upstream binning
//! stage. Every feature owns a contiguous half-open range of globally unique
//! bin ids, ordered by cut threshold ascending; one bin per feature is the
//! designated *null bin*, the bucket an absent value falls into. Each
//! training row is an ascending sparse list of bin ids that never lists a
//! null bin explicitly — absent features are implied.
//!
//! [`ProblemBuilder`] assembles and validates the view: features first, then
//! rows. Validation is strict because everything downstream assumes the
//! layout invariants hold.

/// Immutable binned dataset: per-feature bin layout plus sparse rows.
#[derive(Debug, Clone)]
pub struct BinnedProblem {
    /// CSR offsets into `row_ids`, one entry per row plus a terminator.
    row_offsets: Vec<usize>,
    /// Ascending global bin ids per row.
    row_ids: Vec<usize>,
    /// Half-open bin-id range per feature; `feature_pos[f]..feature_pos[f+1]`.
    feature_pos: Vec<usize>,
    /// Global null bin id per feature.
    null_id: Vec<usize>,
    /// Features with at least two bins, ascending.
    used_features: Vec<usize>,
    /// Original feature column per global bin id.
    feature_index: Vec<u32>,
    /// Owning feature per global bin id.
    bin_feature: Vec<usize>,
    /// Absolute cut threshold per global bin id.
    cuts: Vec<f32>,
}

impl BinnedProblem {
    /// Number of training rows.
    #[inline]
    pub fn vector_count(&self) -> usize {
        self.row_offsets.len() - 1
    }

    /// Ascending sparse bin-id list of one row.
    #[inline]
    pub fn vector_ids(&self, row: usize) -> &[usize] {
        &self.row_ids[self.row_offsets[row]..self.row_offsets[row + 1]]
    }

    /// Number of features.
    #[inline]
    pub fn feature_count(&self) -> usize {
        self.feature_pos.len() - 1
    }

    /// Total number of bin ids.
    #[inline]
    pub fn bin_count(&self) -> usize {
        *self.feature_pos.last().unwrap()
    }

    /// Bin-id range table; `feature_pos()[f]..feature_pos()[f + 1]` are the
    /// bins of feature `f`, ordered by cut threshold ascending.
    #[inline]
    pub fn feature_pos(&self) -> &[usize] {
        &self.feature_pos
    }

    /// The null bin id of a feature.
    #[inline]
    pub fn null_id(&self, feature: usize) -> usize {
        self.null_id[feature]
    }

    /// Features with more than one bin, ascending. Constant features never
    /// produce a split and are skipped by the histogram and split kernels.
    #[inline]
    pub fn used_features(&self) -> &[usize] {
        &self.used_features
    }

    /// Original feature column of a bin id (for tree emission).
    #[inline]
    pub fn feature_index(&self, bin: usize) -> u32 {
        self.feature_index[bin]
    }

    /// The feature owning a bin id.
    #[inline]
    pub fn feature_of(&self, bin: usize) -> usize {
        self.bin_feature[bin]
    }

    /// Absolute cut threshold of a bin id (for tree emission).
    #[inline]
    pub fn cut(&self, bin: usize) -> f32 {
        self.cuts[bin]
    }
}

/// Assembles a [`BinnedProblem`]: add every feature, then every row.
#[derive(Debug)]
pub struct ProblemBuilder {
    max_bins: usize,
    feature_pos: Vec<usize>,
    null_id: Vec<usize>,
    feature_index: Vec<u32>,
    bin_feature: Vec<usize>,
    cuts: Vec<f32>,
    row_offsets: Vec<usize>,
    row_ids: Vec<usize>,
}

impl ProblemBuilder {
    /// Create a builder enforcing the given per-feature histogram width.
    pub fn new(max_bins: usize) -> Self {
        assert!(max_bins > 1, "max_bins must be greater than 1");
        Self {
            max_bins,
            feature_pos: vec![0],
            null_id: Vec::new(),
            feature_index: Vec::new(),
            bin_feature: Vec::new(),
            cuts: Vec::new(),
            row_offsets: vec![0],
            row_ids: Vec::new(),
        }
    }

    /// Register a feature and return its feature id.
    ///
    /// `cuts` are the absolute thresholds of the feature's bins, strictly
    /// ascending; `null_bin` designates the bin an absent value falls into.
    /// Features must be registered before any row is added.
    pub fn add_feature(&mut self, column: u32, cuts: &[f32], null_bin: usize) -> usize {
        assert!(
            self.row_offsets.len() == 1,
            "features must be registered before rows"
        );
        assert!(!cuts.is_empty(), "a feature has at least one bin");
        assert!(
            cuts.len() <= self.max_bins,
            "feature {column} has {} bins, limit is {}",
            cuts.len(),
            self.max_bins
        );
        assert!(
            cuts.windows(2).all(|w| w[0] < w[1]),
            "cut thresholds must be strictly ascending"
        );
        assert!(null_bin < cuts.len(), "null_bin out of range");

        let feature = self.null_id.len();
        let base = *self.feature_pos.last().unwrap();
        self.null_id.push(base + null_bin);
        self.feature_pos.push(base + cuts.len());
        self.cuts.extend_from_slice(cuts);
        self.feature_index
            .extend(std::iter::repeat(column).take(cuts.len()));
        self.bin_feature
            .extend(std::iter::repeat(feature).take(cuts.len()));
        feature
    }

    /// Append one training row as `(feature, bin)` pairs with strictly
    /// ascending features. The null bin of a feature must be expressed by
    /// omitting the feature, never listed.
    pub fn add_row(&mut self, bins: &[(usize, usize)]) {
        let features = self.null_id.len();
        let mut previous: Option<usize> = None;
        for &(feature, bin) in bins {
            assert!(feature < features, "unknown feature {feature}");
            assert!(
                previous.map_or(true, |p| p < feature),
                "row features must be strictly ascending"
            );
            let span = self.feature_pos[feature + 1] - self.feature_pos[feature];
            assert!(bin < span, "bin {bin} out of range for feature {feature}");
            let id = self.feature_pos[feature] + bin;
            assert!(
                id != self.null_id[feature],
                "null bins are implied by omission, not listed"
            );
            self.row_ids.push(id);
            previous = Some(feature);
        }
        self.row_offsets.push(self.row_ids.len());
    }

    /// Finish assembly.
    pub fn finish(self) -> BinnedProblem {
        let used_features = (0..self.null_id.len())
            .filter(|&f| self.feature_pos[f + 1] - self.feature_pos[f] > 1)
            .collect();
        BinnedProblem {
            row_offsets: self.row_offsets,
            row_ids: self.row_ids,
            feature_pos: self.feature_pos,
            null_id: self.null_id,
            used_features,
            feature_index: self.feature_index,
            bin_feature: self.bin_feature,
            cuts: self.cuts,
        }
    }
}
