const SEED: u32 = 43;

/// Pastel palette a series name hashes into.
const PALETTE: [&str; 64] = [
    "ff8080", "ff8b80", "ff9780", "ffa380", "ffaf80", "ffbb80", "ffc780", "ffd380",
    "ffdf80", "ffeb80", "fff780", "fbff80", "efff80", "e3ff80", "d7ff80", "cbff80",
    "bfff80", "b3ff80", "a7ff80", "9bff80", "8fff80", "83ff80", "80ff87", "80ff93",
    "80ff9f", "80ffab", "80ffb7", "80ffc3", "80ffcf", "80ffdb", "80ffe7", "80fff3",
    "80ffff", "80f3ff", "80e7ff", "80dbff", "80cfff", "80c3ff", "80b7ff", "80abff",
    "809fff", "8093ff", "8087ff", "8380ff", "8f80ff", "9b80ff", "a780ff", "b380ff",
    "bf80ff", "cb80ff", "d780ff", "e380ff", "ef80ff", "fb80ff", "ff80f7", "ff80eb",
    "ff80df", "ff80d3", "ff80c7", "ff80bb", "ff80af", "ff80a3", "ff8097", "ff808b",
];

/// MurmurHash3, x86 32-bit variant.
pub fn murmur3_32(key: &[u8], seed: u32) -> u32 {
    const C1: u32 = 0xcc9e_2d51;
    const C2: u32 = 0x1b87_3593;

    let mut h1 = seed;
    let chunks = key.chunks_exact(4);
    let tail = chunks.remainder();

    for chunk in chunks {
        let mut k1 = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k1 = k1.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2);
        h1 ^= k1;
        h1 = h1.rotate_left(13).wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let mut k1 = 0u32;
    if tail.len() >= 3 {
        k1 ^= u32::from(tail[2]) << 16;
    }
    if tail.len() >= 2 {
        k1 ^= u32::from(tail[1]) << 8;
    }
    if !tail.is_empty() {
        k1 ^= u32::from(tail[0]);
        k1 = k1.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2);
        h1 ^= k1;
    }

    h1 ^= key.len() as u32;
    h1 ^= h1 >> 16;
    h1 = h1.wrapping_mul(0x85eb_ca6b);
    h1 ^= h1 >> 13;
    h1 = h1.wrapping_mul(0xc2b2_ae35);
    h1 ^= h1 >> 16;
    h1
}

/// Stable `#rrggbb` color for a series name. Each UTF-16 unit contributes its
/// low byte to the hash input.
pub fn series_color(name: &str) -> String {
    let key: Vec<u8> = name.encode_utf16().map(|unit| (unit & 0xff) as u8).collect();
    let index = murmur3_32(&key, SEED) as usize % PALETTE.len();
    format!("#{}", PALETTE[index])
}
