use std::borrow::Cow;
use std::io::{Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::core::types::BucketId;
use crate::index::IndexError;
use crate::sketch::bloom::BloomHash;
use crate::sketch::minimizer::MinimizerParams;

/// Leading bytes of a framed index file
pub const INDEX_MAGIC: [u8; 8] = *b"FMBIGSI\0";

/// Current framed format version
pub const INDEX_FORMAT_VERSION: u32 = 2;

/// Bits per storage word
pub const WORD_BITS: usize = 16;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Descriptor written in front of the word payload of a framed index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexHeader {
    pub magic: [u8; 8],
    pub version: u32,
    /// Bloom filter size the index was built with
    pub num_rows: u64,
    /// Bucket columns, always a multiple of 16
    pub num_cols: u64,
    pub word_bits: u32,
    pub minimizer: MinimizerParams,
    /// How minimizers were mapped to rows
    pub bloom_hash: BloomHash,
    /// Hex MD5 of the little-endian payload bytes
    pub payload_md5: String,
    pub created_at: String,
}

/// Bit matrix with one row per Bloom position and one column per bucket.
///
/// Stored row-major as 16-bit words; within a word the most significant bit is
/// the lowest column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitSlicedIndex {
    header: IndexHeader,
    words: Vec<u16>,
}

/// Borrowed view of one unpacked row
#[derive(Debug, Clone, Copy)]
pub struct RowBits<'a> {
    words: &'a [u16],
}

impl<'a> RowBits<'a> {
    /// Whether `column` is set in this row
    #[must_use]
    pub fn get(&self, column: BucketId) -> bool {
        self.words
            .get(column / WORD_BITS)
            .is_some_and(|&word| word & column_mask(column) != 0)
    }

    #[must_use]
    pub fn words(&self) -> &'a [u16] {
        self.words
    }

    #[must_use]
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Ascending set columns
    pub fn set_columns(&self) -> impl Iterator<Item = BucketId> + 'a {
        set_columns(self.words)
    }

    /// Row as a `'0'`/`'1'` string, lowest column first
    #[must_use]
    pub fn to_bit_string(&self) -> String {
        let mut bits = String::with_capacity(self.words.len() * WORD_BITS);
        for word in self.words {
            bits.push_str(&format!("{word:016b}"));
        }
        bits
    }
}

#[inline]
fn column_mask(column: BucketId) -> u16 {
    1u16 << (WORD_BITS - 1 - column % WORD_BITS)
}

/// Ascending columns whose bit is set in a packed row
pub fn set_columns(words: &[u16]) -> impl Iterator<Item = BucketId> + '_ {
    words.iter().enumerate().flat_map(|(word_idx, &word)| {
        let mut remaining = word;
        std::iter::from_fn(move || {
            if remaining == 0 {
                return None;
            }
            let lead = remaining.leading_zeros() as usize;
            remaining &= !(1u16 << (WORD_BITS - 1 - lead));
            Some(word_idx * WORD_BITS + lead)
        })
    })
}

fn payload_bytes(words: &[u16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(words.len() * 2);
    for word in words {
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    bytes
}

fn words_from_bytes(bytes: &[u8]) -> Result<Vec<u16>, IndexError> {
    if bytes.len() % 2 != 0 {
        return Err(IndexError::Malformed(format!(
            "payload of {} bytes is not a whole number of 16-bit words",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

fn payload_md5(words: &[u16]) -> String {
    format!("{:x}", md5::compute(payload_bytes(words)))
}

/// Transparently inflate gzip input
fn maybe_decompress(bytes: &[u8]) -> Result<Cow<'_, [u8]>, IndexError> {
    if bytes.starts_with(&GZIP_MAGIC) {
        let mut inflated = Vec::new();
        GzDecoder::new(bytes).read_to_end(&mut inflated)?;
        Ok(Cow::Owned(inflated))
    } else {
        Ok(Cow::Borrowed(bytes))
    }
}

fn check_dimensions(num_rows: u64, num_cols: u64, num_words: usize) -> Result<(), IndexError> {
    if num_cols == 0 || num_cols % WORD_BITS as u64 != 0 {
        return Err(IndexError::Malformed(format!(
            "column count {num_cols} is not a positive multiple of {WORD_BITS}"
        )));
    }
    if num_rows == 0 {
        return Err(IndexError::Malformed("index has no rows".to_string()));
    }
    let expected_words = num_rows
        .checked_mul(num_cols / WORD_BITS as u64)
        .ok_or_else(|| IndexError::Malformed("index dimensions overflow".to_string()))?;
    if expected_words != num_words as u64 {
        return Err(IndexError::Malformed(format!(
            "{num_rows} rows x {num_cols} columns needs {expected_words} words, payload has {num_words}"
        )));
    }
    Ok(())
}

impl BitSlicedIndex {
    /// Wrap an existing word payload
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Malformed` if the payload does not hold exactly
    /// `num_rows * num_cols` bits or `num_cols` is not a multiple of 16.
    pub fn from_words(
        num_rows: usize,
        num_cols: usize,
        words: Vec<u16>,
        params: MinimizerParams,
    ) -> Result<Self, IndexError> {
        check_dimensions(num_rows as u64, num_cols as u64, words.len())?;
        let header = IndexHeader {
            magic: INDEX_MAGIC,
            version: INDEX_FORMAT_VERSION,
            num_rows: num_rows as u64,
            num_cols: num_cols as u64,
            word_bits: WORD_BITS as u32,
            minimizer: params,
            bloom_hash: BloomHash::default(),
            payload_md5: payload_md5(&words),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        Ok(Self { header, words })
    }

    /// All-zero index, filled in by [`Self::set`]
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Malformed` on invalid dimensions.
    pub fn zeroed(
        num_rows: usize,
        num_cols: usize,
        params: MinimizerParams,
    ) -> Result<Self, IndexError> {
        let words = vec![0u16; num_rows * (num_cols / WORD_BITS)];
        Self::from_words(num_rows, num_cols, words, params)
    }

    /// Bloom filter size (row count)
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.header.num_rows as usize
    }

    #[must_use]
    pub fn num_cols(&self) -> usize {
        self.header.num_cols as usize
    }

    #[must_use]
    pub fn words_per_row(&self) -> usize {
        self.num_cols() / WORD_BITS
    }

    #[must_use]
    pub fn header(&self) -> &IndexHeader {
        &self.header
    }

    #[must_use]
    pub fn params(&self) -> &MinimizerParams {
        &self.header.minimizer
    }

    #[must_use]
    pub fn bloom_hash(&self) -> BloomHash {
        self.header.bloom_hash
    }

    #[must_use]
    pub fn words(&self) -> &[u16] {
        &self.words
    }

    pub fn set(&mut self, row: usize, column: BucketId) {
        let idx = row * self.words_per_row() + column / WORD_BITS;
        self.words[idx] |= column_mask(column);
    }

    #[must_use]
    pub fn get(&self, row: usize, column: BucketId) -> bool {
        self.row(row).is_some_and(|bits| bits.get(column))
    }

    /// Row `row`, or `None` past the last row
    #[must_use]
    pub fn row(&self, row: usize) -> Option<RowBits<'_>> {
        let width = self.words_per_row();
        let start = row.checked_mul(width)?;
        self.words
            .get(start..start + width)
            .map(|words| RowBits { words })
    }

    /// Rows selected by `rows`, in order; rows past the end are skipped
    #[must_use]
    pub fn submatrix(&self, rows: &[usize]) -> Vec<RowBits<'_>> {
        rows.iter().filter_map(|&r| self.row(r)).collect()
    }

    /// Recompute the payload checksum after in-place edits
    pub fn seal(&mut self) {
        self.header.payload_md5 = payload_md5(&self.words);
    }

    /// Serialize as header + little-endian payload
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Header` if the header cannot be encoded.
    pub fn encode(&self) -> Result<Vec<u8>, IndexError> {
        let mut header = self.header.clone();
        header.payload_md5 = payload_md5(&self.words);
        let mut bytes = bincode::serialize(&header)?;
        bytes.extend_from_slice(&payload_bytes(&self.words));
        Ok(bytes)
    }

    /// Write the framed form to `path`, gzip-compressed when it ends in `.gz`
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    pub fn write_to(&self, path: &Path) -> Result<(), IndexError> {
        let bytes = self.encode()?;
        let file = std::fs::File::create(path)?;
        if path.extension().is_some_and(|ext| ext == "gz") {
            let mut encoder = GzEncoder::new(file, Compression::default());
            encoder.write_all(&bytes)?;
            encoder.finish()?;
        } else {
            let mut writer = std::io::BufWriter::new(file);
            writer.write_all(&bytes)?;
            writer.flush()?;
        }
        Ok(())
    }

    /// Decode a framed index (optionally gzip-compressed).
    ///
    /// # Errors
    ///
    /// Fails on a bad magic, unsupported version or word size, inconsistent
    /// dimensions, or a payload checksum mismatch.
    pub fn decode_framed(bytes: &[u8]) -> Result<Self, IndexError> {
        let bytes = maybe_decompress(bytes)?;
        if !bytes.starts_with(&INDEX_MAGIC) {
            return Err(IndexError::Malformed(
                "missing index header (not a framed index file)".to_string(),
            ));
        }

        let mut cursor = std::io::Cursor::new(bytes.as_ref());
        let header: IndexHeader = bincode::deserialize_from(&mut cursor)?;
        if header.version != INDEX_FORMAT_VERSION {
            return Err(IndexError::Malformed(format!(
                "unsupported index format version {} (expected {INDEX_FORMAT_VERSION})",
                header.version
            )));
        }
        if header.word_bits as usize != WORD_BITS {
            return Err(IndexError::Malformed(format!(
                "unsupported word size {} (expected {WORD_BITS})",
                header.word_bits
            )));
        }
        if !header.bloom_hash.is_supported() {
            return Err(IndexError::Malformed(format!(
                "index rows were filled with an unsupported Bloom hash (expected {})",
                BloomHash::Murmur3Decimal
            )));
        }

        #[allow(clippy::cast_possible_truncation)]
        let offset = cursor.position() as usize;
        let words = words_from_bytes(&bytes[offset..])?;
        check_dimensions(header.num_rows, header.num_cols, words.len())?;

        let found = payload_md5(&words);
        if found != header.payload_md5 {
            return Err(IndexError::ChecksumMismatch {
                expected: header.payload_md5,
                found,
            });
        }

        tracing::debug!(
            "decoded framed index: {} rows x {} columns",
            header.num_rows,
            header.num_cols
        );
        Ok(Self { header, words })
    }

    /// Decode a bare word array whose column count and Bloom hash are known
    /// from elsewhere.
    ///
    /// The row count (Bloom filter size) is derived from the payload length and
    /// must come out exact.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Malformed` if the rows were filled with a Bloom
    /// hash this build cannot reproduce, or the payload is not a whole number
    /// of rows of `num_cols` bits.
    pub fn decode_raw(
        bytes: &[u8],
        num_cols: usize,
        params: MinimizerParams,
        bloom_hash: BloomHash,
    ) -> Result<Self, IndexError> {
        if !bloom_hash.is_supported() {
            return Err(IndexError::Malformed(format!(
                "raw index uses an unsupported Bloom hash (expected {})",
                BloomHash::Murmur3Decimal
            )));
        }
        let bytes = maybe_decompress(bytes)?;
        let words = words_from_bytes(&bytes)?;
        if num_cols == 0 || num_cols % WORD_BITS != 0 {
            return Err(IndexError::Malformed(format!(
                "column count {num_cols} is not a positive multiple of {WORD_BITS}"
            )));
        }
        let words_per_row = num_cols / WORD_BITS;
        if words.len() % words_per_row != 0 {
            return Err(IndexError::Malformed(format!(
                "{} words do not divide into rows of {num_cols} columns",
                words.len()
            )));
        }
        let num_rows = words.len() / words_per_row;
        tracing::debug!("decoded raw index: {num_rows} rows x {num_cols} columns");
        Self::from_words(num_rows, num_cols, words, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_index() -> BitSlicedIndex {
        // 3 rows x 32 columns
        let words = vec![0x8000, 0x0001, 0xFFFF, 0x0000, 0x4002, 0x8000];
        BitSlicedIndex::from_words(3, 32, words, MinimizerParams::default()).unwrap()
    }

    #[test]
    fn test_msb_is_lowest_column() {
        let index = small_index();
        assert!(index.get(0, 0));
        assert!(!index.get(0, 1));
        assert!(index.get(0, 31));
        assert!(index.get(2, 1));
        assert!(index.get(2, 14));
        assert!(index.get(2, 16));
        assert!(!index.get(3, 0));
    }

    #[test]
    fn test_row_unpacking() {
        let index = small_index();
        let row = index.row(0).unwrap();
        assert_eq!(row.set_columns().collect::<Vec<_>>(), vec![0, 31]);
        assert_eq!(
            row.to_bit_string(),
            "10000000000000000000000000000001"
        );
        assert_eq!(index.row(1).unwrap().count_ones(), 16);
        assert!(index.row(3).is_none());
    }

    #[test]
    fn test_set_columns_helper() {
        let cols: Vec<_> = set_columns(&[0x4002, 0x8000]).collect();
        assert_eq!(cols, vec![1, 14, 16]);
    }

    #[test]
    fn test_submatrix_skips_out_of_range_rows() {
        let index = small_index();
        let rows = index.submatrix(&[2, 0, 7]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].words(), &[0x4002, 0x8000]);
    }

    #[test]
    fn test_set_then_get() {
        let mut index = BitSlicedIndex::zeroed(4, 16, MinimizerParams::default()).unwrap();
        index.set(3, 15);
        index.set(0, 0);
        assert!(index.get(3, 15));
        assert!(index.get(0, 0));
        assert_eq!(index.words()[3], 0x0001);
        assert_eq!(index.words()[0], 0x8000);
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let params = MinimizerParams::default();
        assert!(matches!(
            BitSlicedIndex::from_words(3, 32, vec![0; 5], params),
            Err(IndexError::Malformed(_))
        ));
        assert!(matches!(
            BitSlicedIndex::from_words(2, 24, vec![0; 3], params),
            Err(IndexError::Malformed(_))
        ));
    }

    #[test]
    fn test_framed_roundtrip_and_checksum() {
        let index = small_index();
        let bytes = index.encode().unwrap();
        assert!(bytes.starts_with(&INDEX_MAGIC));

        let decoded = BitSlicedIndex::decode_framed(&bytes).unwrap();
        assert_eq!(decoded.words(), index.words());
        assert_eq!(decoded.num_rows(), 3);
        assert_eq!(decoded.num_cols(), 32);

        let mut corrupt = bytes.clone();
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0xFF;
        assert!(matches!(
            BitSlicedIndex::decode_framed(&corrupt),
            Err(IndexError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_truncated_framed_payload() {
        let bytes = small_index().encode().unwrap();
        let truncated = &bytes[..bytes.len() - 2];
        assert!(matches!(
            BitSlicedIndex::decode_framed(truncated),
            Err(IndexError::Malformed(_))
        ));
    }

    #[test]
    fn test_raw_decoding() {
        let index = small_index();
        let raw = payload_bytes(index.words());
        let params = MinimizerParams::default();
        let decoded = BitSlicedIndex::decode_raw(&raw, 32, params, BloomHash::Murmur3Decimal).unwrap();
        assert_eq!(decoded.num_rows(), 3);
        assert_eq!(decoded.words(), index.words());

        // 6 words cannot be split into rows of 4 words
        assert!(matches!(
            BitSlicedIndex::decode_raw(&raw, 64, params, BloomHash::default()),
            Err(IndexError::Malformed(_))
        ));
        assert!(matches!(
            BitSlicedIndex::decode_raw(&raw[..5], 32, params, BloomHash::default()),
            Err(IndexError::Malformed(_))
        ));
    }

    #[test]
    fn test_raw_with_unsupported_hash_is_rejected() {
        let raw = payload_bytes(small_index().words());
        let err = BitSlicedIndex::decode_raw(
            &raw,
            32,
            MinimizerParams::default(),
            BloomHash::Unsupported,
        )
        .unwrap_err();
        assert!(matches!(err, IndexError::Malformed(msg) if msg.contains("murmur3_decimal")));
    }

    #[test]
    fn test_framed_header_records_bloom_hash() {
        let index = small_index();
        assert_eq!(index.bloom_hash(), BloomHash::Murmur3Decimal);
        let decoded = BitSlicedIndex::decode_framed(&index.encode().unwrap()).unwrap();
        assert_eq!(decoded.header().bloom_hash, BloomHash::Murmur3Decimal);

        let mut foreign = small_index();
        foreign.header.bloom_hash = BloomHash::Unsupported;
        assert!(matches!(
            BitSlicedIndex::decode_framed(&foreign.encode().unwrap()),
            Err(IndexError::Malformed(_))
        ));
    }

    #[test]
    fn test_raw_bytes_are_not_framed() {
        let raw = payload_bytes(small_index().words());
        assert!(matches!(
            BitSlicedIndex::decode_framed(&raw),
            Err(IndexError::Malformed(_))
        ));
    }

    #[test]
    fn test_gzip_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.bin.gz");
        let index = small_index();
        index.write_to(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(&GZIP_MAGIC));
        let decoded = BitSlicedIndex::decode_framed(&bytes).unwrap();
        assert_eq!(decoded.words(), index.words());
    }
}
