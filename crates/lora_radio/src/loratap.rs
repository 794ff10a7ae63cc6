use crate::phy_header::PhyHeader;

const LORATAP_VERSION: u8 = 0;
const LORATAP_HEADER_LEN: u16 = 15;

/// A fully assembled LoRaTap v0 frame: 15-byte radio-metadata header, 3-byte
/// PHY header, and the payload (including MAC CRC bytes if present).
#[derive(Debug, Clone, PartialEq)]
pub struct LoraTapFrame {
    pub channel_frequency: u32,
    /// Channel bandwidth in units of 125 kHz.
    pub channel_bandwidth: u8,
    pub channel_sf: u8,
    pub rssi_packet: u8,
    pub rssi_max: u8,
    pub rssi_current: u8,
    pub snr: u8,
    pub sync_word: u8,
    pub phy_header: PhyHeader,
    pub payload: Vec<u8>,
}

impl LoraTapFrame {
    /// Converts a linear SNR ratio into the `dBm = -139 + field` (or the
    /// quarter-step variant below 0 dB) RSSI encoding used by every RSSI
    /// field in the header.
    pub fn encode_rssi(dbm: f32) -> u8 {
        let field = if dbm < 0.0 { (dbm + 139.0) * 4.0 } else { dbm + 139.0 };
        field.round().clamp(0.0, 255.0) as u8
    }

    pub fn encode_snr(snr_linear: f32) -> u8 {
        let snr_db = 10.0 * snr_linear.max(f32::MIN_POSITIVE).log10();
        snr_db.round().clamp(-128.0, 127.0) as i8 as u8
    }

    /// Serializes the frame into its wire representation, big-endian and
    /// packed.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            LORATAP_HEADER_LEN as usize + 3 + self.payload.len(),
        );

        out.push(LORATAP_VERSION);
        out.push(0); // padding
        out.extend_from_slice(&LORATAP_HEADER_LEN.to_be_bytes());
        out.extend_from_slice(&self.channel_frequency.to_be_bytes());
        out.push(self.channel_bandwidth);
        out.push(self.channel_sf);
        out.push(self.rssi_packet);
        out.push(self.rssi_max);
        out.push(self.rssi_current);
        out.push(self.snr);
        out.push(self.sync_word);

        let byte1 = (self.phy_header.crc_nibbles >> 4) << 4
            | (u8::from(self.phy_header.has_mac_crc) << 3)
            | (self.phy_header.cr as u8 & 0b111);
        let byte2 = (self.phy_header.crc_nibbles & 0x0F) << 4 | (self.phy_header.reserved & 0x0F);
        out.push(self.phy_header.length);
        out.push(byte1);
        out.push(byte2);

        out.extend_from_slice(&self.payload);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rssi_uses_quarter_step_below_zero_dbm() {
        assert_eq!(LoraTapFrame::encode_rssi(0.0), 139);
        let below = LoraTapFrame::encode_rssi(-4.0);
        assert_eq!(below, ((-4.0f32 + 139.0) * 4.0).round() as u8);
    }

    #[test]
    fn to_bytes_has_expected_total_length() {
        let header = PhyHeader::parse([5, 0b0000_0100, 0]);
        let frame = LoraTapFrame {
            channel_frequency: 915_000_000,
            channel_bandwidth: 1,
            channel_sf: 7,
            rssi_packet: 100,
            rssi_max: 110,
            rssi_current: 95,
            snr: 10,
            sync_word: 0x34,
            phy_header: header,
            payload: vec![1, 2, 3, 4, 5],
        };
        let bytes = frame.to_bytes();
        assert_eq!(bytes.len(), 15 + 3 + 5);
        assert_eq!(bytes[0], 0);
        assert_eq!(&bytes[2..4], &15u16.to_be_bytes());
    }
}
