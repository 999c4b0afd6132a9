use ipnet::IpNet;

/// CIDR utility functions for parsing and validation

/// Parse a CIDR prefix (IPv4 or IPv6), truncating any host bits.
///
/// `10.0.0.7/24` parses to `10.0.0.0/24`. A bare address without a prefix
/// length is rejected.
pub fn parse_cidr(cidr: &str) -> Result<IpNet, String> {
    let trimmed = cidr.trim();
    if !trimmed.contains('/') {
        return Err(format!("'{}' is missing a prefix length", cidr));
    }

    trimmed
        .parse::<IpNet>()
        .map(|net| net.trunc())
        .map_err(|e| format!("invalid CIDR '{}': {}", cidr, e))
}

/// Number of addresses covered by a prefix, saturating at `u128::MAX`.
pub fn address_count(net: &IpNet) -> u128 {
    let host_bits = u32::from(net.max_prefix_len() - net.prefix_len());
    1u128.checked_shl(host_bits).unwrap_or(u128::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cidr_truncates_host_bits() {
        let net = parse_cidr("10.0.0.7/24").unwrap();
        assert_eq!(net.to_string(), "10.0.0.0/24");

        let net = parse_cidr("fd00::1/64").unwrap();
        assert_eq!(net.to_string(), "fd00::/64");
    }

    #[test]
    fn test_parse_cidr_rejects_garbage() {
        assert!(parse_cidr("10.0.0.0").is_err());
        assert!(parse_cidr("10.0.0.0/33").is_err());
        assert!(parse_cidr("not-a-cidr/8").is_err());
        assert!(parse_cidr("").is_err());
    }

    #[test]
    fn test_address_count() {
        assert_eq!(address_count(&parse_cidr("10.0.0.0/24").unwrap()), 256);
        assert_eq!(address_count(&parse_cidr("10.0.0.1/32").unwrap()), 1);
        assert_eq!(address_count(&parse_cidr("::/0").unwrap()), u128::MAX);
    }
}
