fn rotl(bits: u32, count: u32, size: u32) -> u32 {
    let count = count % size;
    let len_mask = (1u32 << size) - 1;
    let bits = bits & len_mask;
    ((bits << count) & len_mask) | (bits >> (size - count))
}

fn rotr(bits: u32, count: u32, size: u32) -> u32 {
    if count == 0 {
        return bits & ((1u32 << size) - 1);
    }
    rotl(bits, size - (count % size), size)
}

/// Diagonal deinterleave: `words.len()` input words of `ppm` bits each go in
/// (one block's worth of demodulated symbols), `ppm` output words of
/// `words.len()` bits each come out (one byte per output word once `ppm`
/// stays at or below 8). Bit `bit_index` of `rotl(words[i], i, ppm)` lands in
/// output word `ppm - 1 - bit_index`, at bit position `i`.
pub fn deinterleave(words: &[u32], ppm: u32) -> Vec<u32> {
    let mut out = vec![0u32; ppm as usize];
    for (i, &word) in words.iter().enumerate() {
        let rotated = rotl(word, i as u32, ppm);
        for bit_index in 0..ppm {
            let bit = (rotated >> bit_index) & 1;
            let x = ppm - 1 - bit_index;
            out[x as usize] |= bit << (i as u32);
        }
    }
    out
}

/// The forward transform `deinterleave` inverts, used only by tests to check
/// the round trip. `n_words` is the original number of input words
/// (`words.len()` before deinterleaving).
pub fn interleave(words: &[u32], ppm: u32, n_words: u32) -> Vec<u32> {
    let mut out = vec![0u32; n_words as usize];
    for i in 0..n_words {
        let mut rotated = 0u32;
        for bit_index in 0..ppm {
            let x = ppm - 1 - bit_index;
            let bit = (words[x as usize] >> i) & 1;
            rotated |= bit << bit_index;
        }
        out[i as usize] = rotr(rotated, i, ppm);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn deinterleave_then_interleave_roundtrips(raw: Vec<u32>) -> bool {
        let ppm = 7u32;
        let n_words = 8u32;
        let words: Vec<u32> = raw.iter().take(n_words as usize).map(|w| w & 0x7F).collect();
        if words.len() < n_words as usize {
            return true;
        }
        let deinterleaved = deinterleave(&words, ppm);
        interleave(&deinterleaved, ppm, n_words) == words
    }
}
