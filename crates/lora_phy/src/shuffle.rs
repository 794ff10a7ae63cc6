use crate::tables::SHUFFLE_PATTERN;

/// Undoes the fixed diagonal bit shuffle: bit `j` of the result is bit
/// `SHUFFLE_PATTERN[j]` of `byte`.
pub fn deshuffle(byte: u8) -> u8 {
    let mut result = 0u8;
    for (j, &source_bit) in SHUFFLE_PATTERN.iter().enumerate() {
        let bit = (byte >> source_bit) & 1;
        result |= bit << j;
    }
    result
}

/// Applies the forward shuffle, used only by tests to check the round trip.
pub fn shuffle(byte: u8) -> u8 {
    let mut result = 0u8;
    for (j, &dest_bit) in SHUFFLE_PATTERN.iter().enumerate() {
        let bit = (byte >> j) & 1;
        result |= bit << dest_bit;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn shuffle_then_deshuffle_roundtrips(byte: u8) -> bool {
        deshuffle(shuffle(byte)) == byte
    }
}
