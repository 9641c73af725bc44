use std::collections::BTreeMap;

/// Chart colours for the assets the fetchers maintain, keyed by display name.
const KNOWN_COLORS: &[(&str, (u8, u8, u8))] = &[
    ("Bitcoin", (0xFF, 0x6B, 0x35)),
    ("Ethereum", (0x10, 0xB9, 0x81)),
    ("Solana", (0x3B, 0x82, 0xF6)),
    ("Quantum Flow", (0x8B, 0x5C, 0xF6)),
];

const FALLBACK_PALETTE: &[(u8, u8, u8)] = &[
    (0x1F, 0x77, 0xB4),
    (0xFF, 0x7F, 0x0E),
    (0x2C, 0xA0, 0x2C),
    (0xD6, 0x27, 0x28),
    (0x94, 0x67, 0xBD),
    (0x8C, 0x56, 0x4B),
];

/// "bitcoin" → "Bitcoin", unless the configuration names the asset explicitly.
pub fn display_name(asset: &str, overrides: &BTreeMap<String, String>) -> String {
    if let Some(name) = overrides.get(&asset.to_lowercase()) {
        return name.clone();
    }

    let mut chars = asset.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

pub fn color_for(name: &str, index: usize) -> (u8, u8, u8) {
    KNOWN_COLORS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, rgb)| *rgb)
        .unwrap_or(FALLBACK_PALETTE[index % FALLBACK_PALETTE.len()])
}
