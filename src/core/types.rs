use serde::{Deserialize, Serialize};

/// Default fragment length used by fragment-vote queries
pub const DEFAULT_FRAGMENT_SIZE: usize = 500;

/// Unique name of an index in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexName(pub String);

impl IndexName {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl std::fmt::Display for IndexName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bucket number: a column of the bit-sliced index
pub type BucketId = usize;

/// Strategy used to match a query against the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum QueryMode {
    /// Whole query as one sketch, scored by minimizer containment
    Containment,
    /// Query split into fixed-size fragments, each voting for buckets that contain it
    FragmentVote { fragment_size: usize },
}

impl QueryMode {
    #[must_use]
    pub fn fragment_vote() -> Self {
        Self::FragmentVote {
            fragment_size: DEFAULT_FRAGMENT_SIZE,
        }
    }
}

impl Default for QueryMode {
    fn default() -> Self {
        Self::Containment
    }
}

impl std::fmt::Display for QueryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Containment => write!(f, "containment"),
            Self::FragmentVote { fragment_size } => write!(f, "fragment-vote ({fragment_size} bp)"),
        }
    }
}

/// Genomic interval covered by one bucket of the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub ref_name: String,
    pub bucket_start: u64,
    pub bucket_end: u64,
}

impl Bucket {
    pub fn new(ref_name: impl Into<String>, bucket_start: u64, bucket_end: u64) -> Self {
        Self {
            ref_name: ref_name.into(),
            bucket_start,
            bucket_end,
        }
    }

    /// Display name in `ref:start-end` form
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}:{}-{}", self.ref_name, self.bucket_start, self.bucket_end)
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.bucket_end.saturating_sub(self.bucket_start)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result for one bucket.
///
/// Serializes to `{"containment": .., "score": ..}` or `{"hits": .., "score": "k/n"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HitRecord {
    /// Containment mode: raw containment ratio and estimated percent identity
    Containment { containment: f64, score: f64 },
    /// Fragment-vote mode: number of fragments found, score as `hits/num_fragments`
    Votes { hits: usize, score: String },
}

impl HitRecord {
    #[must_use]
    pub fn votes(hits: usize, num_fragments: usize) -> Self {
        Self::Votes {
            hits,
            score: format!("{hits}/{num_fragments}"),
        }
    }

    /// Score rendered for display
    #[must_use]
    pub fn score_label(&self) -> String {
        match self {
            Self::Containment { score, .. } => format!("{score:.2}%"),
            Self::Votes { score, .. } => score.clone(),
        }
    }

    /// Numeric sort key (higher is better)
    #[must_use]
    pub fn rank_value(&self) -> f64 {
        match self {
            Self::Containment { score, .. } => *score,
            #[allow(clippy::cast_precision_loss)]
            Self::Votes { hits, .. } => *hits as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_votes_score_string() {
        let record = HitRecord::votes(3, 6);
        assert_eq!(
            record,
            HitRecord::Votes {
                hits: 3,
                score: "3/6".to_string()
            }
        );
        assert_eq!(record.score_label(), "3/6");
    }

    #[test]
    fn test_hit_record_serialization() {
        let json = serde_json::to_value(HitRecord::votes(2, 4)).unwrap();
        assert_eq!(json, serde_json::json!({"hits": 2, "score": "2/4"}));

        let json = serde_json::to_value(HitRecord::Containment {
            containment: 1.0,
            score: 100.0,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"containment": 1.0, "score": 100.0}));
    }

    #[test]
    fn test_bucket_name() {
        let bucket = Bucket::new("chr1", 0, 1_000_000);
        assert_eq!(bucket.name(), "chr1:0-1000000");
        assert_eq!(bucket.len(), 1_000_000);
    }

    #[test]
    fn test_query_mode_serde() {
        let mode: QueryMode =
            serde_json::from_str(r#"{"type":"fragment_vote","fragment_size":250}"#).unwrap();
        assert_eq!(mode, QueryMode::FragmentVote { fragment_size: 250 });
        assert_eq!(QueryMode::default(), QueryMode::Containment);
    }
}
