//! The deterministic partition label routing one observation to a
//! downstream `update_<type>_<shard>` queue.
//!
//! Uses the trailing two hex digits of the mac address for blue/wifi
//! (uniformly distributed across manufacturers), and a 2-digit modulo
//! hash of the cell id for cell towers.

const CELL_SHARD_COUNT: u64 = 100;

/// Shard id for a bluetooth or wifi mac address.
pub fn shard_id_for_mac(mac: &str) -> String {
    let hex: String = mac.chars().filter(|c| c.is_ascii_hexdigit()).collect();
    if hex.len() >= 2 {
        hex[hex.len() - 2..].to_ascii_lowercase()
    } else {
        "00".to_string()
    }
}

/// Shard id for a cell tower, keyed by its bare cell id.
pub fn shard_id_for_cell(cellid: &str) -> String {
    let hash = cellid
        .bytes()
        .fold(0u64, |acc, byte| acc.wrapping_mul(31).wrapping_add(byte as u64));
    format!("{:02}", hash % CELL_SHARD_COUNT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_shard_uses_trailing_hex_digits() {
        assert_eq!(shard_id_for_mac("AA:BB:CC:DD:EE:FF"), "ff");
        assert_eq!(shard_id_for_mac("aa:bb:cc:dd:ee:01"), "01");
    }

    #[test]
    fn cell_shard_is_deterministic() {
        assert_eq!(shard_id_for_cell("310:260:1234:5678"), shard_id_for_cell("310:260:1234:5678"));
    }
}
