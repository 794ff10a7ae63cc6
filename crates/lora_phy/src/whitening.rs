/// Dewhitens `bytes` by XOR against `table`, cycling `table` if it is shorter
/// than `bytes` (it never is in practice; the tables are generated wide).
pub fn dewhiten(bytes: &[u8], table: &[u8]) -> Vec<u8> {
    bytes
        .iter()
        .enumerate()
        .map(|(i, &b)| b ^ table[i % table.len()])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dewhiten_is_its_own_inverse() {
        let table = vec![0x5A, 0x3C, 0xFF, 0x00];
        let payload = vec![1, 2, 3, 4, 5];
        let whitened = dewhiten(&payload, &table);
        let recovered = dewhiten(&whitened, &table);
        assert_eq!(recovered, payload);
    }
}
