use std::collections::HashMap;

use crate::hamming::{extract_data_only, hamming_decode_soft};
use crate::interleave::deinterleave;
use crate::shuffle::deshuffle;
use crate::tables::{header_whitening_table, payload_whitening_table};
use crate::whitening::dewhiten;

/// Which nibble-order convention a block belongs to. Resolved against the
/// header/payload Hamming pairing: payload uses the straight order, header
/// uses the mirrored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Header,
    Payload,
}

/// Turns demodulated, Gray-decoded symbol words into decoded data bytes.
///
/// Deinterleave, deshuffle, dewhiten, and FEC are pure bit-transforms with no
/// knowledge of samples or symbol timing; `BlockDecoder` exists purely to
/// cache the whitening tables, which are otherwise too expensive to
/// regenerate per block on the steady-state decode path.
pub struct BlockDecoder {
    header_table: Vec<u8>,
    payload_tables: HashMap<(u32, bool, bool), Vec<u8>>,
}

impl BlockDecoder {
    /// Precomputes the header table and every `(cr, reduced_rate,
    /// implicit_header)` payload table variant up front, so `decode_block`
    /// never allocates a fresh whitening sequence mid-stream.
    pub fn new() -> Self {
        let mut payload_tables = HashMap::new();
        for cr in 1..=4u32 {
            for reduced_rate in [false, true] {
                for implicit_header in [false, true] {
                    payload_tables.insert(
                        (cr, reduced_rate, implicit_header),
                        payload_whitening_table(cr, reduced_rate, implicit_header),
                    );
                }
            }
        }
        Self { header_table: header_whitening_table(), payload_tables }
    }

    /// Decodes one block of Gray-decoded symbol words into data bytes.
    ///
    /// `ppm` is the bits-per-word used for deinterleaving (`sf` for the
    /// payload, `sf - redundancy` for the header). `cr` selects the FEC path:
    /// `cr` in `{3, 4}` uses Hamming(8,4)/(7,4) correction, `{1, 2}` extracts
    /// data bits directly with no parity.
    pub fn decode_block(
        &self,
        words: &[u32],
        ppm: u32,
        cr: u32,
        kind: BlockKind,
        reduced_rate: bool,
        implicit_header: bool,
    ) -> Vec<u8> {
        let deinterleaved = deinterleave(words, ppm);
        let shuffled: Vec<u8> = deinterleaved.iter().map(|&w| deshuffle(w as u8)).collect();

        let table: &[u8] = match kind {
            BlockKind::Header => &self.header_table,
            BlockKind::Payload => &self.payload_tables[&(cr, reduced_rate, implicit_header)],
        };
        let dewhitened = dewhiten(&shuffled, table);

        // Payload blocks swap the decoded nibbles before the byte is appended;
        // the header uses the opposite (unswapped) convention.
        let swap_nibbles = matches!(kind, BlockKind::Payload);
        if cr >= 3 {
            hamming_decode_soft(&dewhitened, swap_nibbles)
        } else {
            extract_data_only(&dewhitened, swap_nibbles)
        }
    }
}

impl Default for BlockDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructs_all_sixteen_payload_variants() {
        let decoder = BlockDecoder::new();
        assert_eq!(decoder.payload_tables.len(), 16);
    }

    #[test]
    fn decode_block_does_not_panic_on_minimal_input() {
        let decoder = BlockDecoder::new();
        let words = vec![0b0000101u32; 8];
        let out = decoder.decode_block(&words, 7, 4, BlockKind::Payload, false, false);
        assert!(!out.is_empty());
    }
}
