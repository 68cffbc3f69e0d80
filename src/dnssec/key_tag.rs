/// Calculate the key tag for a DNSKEY record (RFC 4034 Appendix B)
pub fn calculate_key_tag(flags: u16, protocol: u8, algorithm: u8, public_key: &[u8]) -> u16 {
    // Special case for algorithm 1 (RSAMD5)
    if algorithm == 1 {
        // For RSAMD5, use the low 16 bits of the modulus
        if public_key.len() >= 2 {
            return u16::from_be_bytes([
                public_key[public_key.len() - 2],
                public_key[public_key.len() - 1],
            ]);
        }
        return 0;
    }

    // For all other algorithms, use the standard calculation
    let mut accumulator: u32 = 0;

    // Build DNSKEY RDATA: flags (2) + protocol (1) + algorithm (1) + public key
    let mut rdata = Vec::new();
    rdata.extend_from_slice(&flags.to_be_bytes());
    rdata.push(protocol);
    rdata.push(algorithm);
    rdata.extend_from_slice(public_key);

    // Calculate key tag by processing all bytes
    for (i, &byte) in rdata.iter().enumerate() {
        if i % 2 == 0 {
            accumulator += u32::from(byte) << 8;
        } else {
            accumulator += u32::from(byte);
        }
    }

    // Add carries and mask to 16 bits
    accumulator += accumulator >> 16;
    (accumulator & 0xFFFF) as u16
}
