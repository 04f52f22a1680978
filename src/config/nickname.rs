//! Random display names for clients started without `--name`.
//!
//! Names look like `NeonFox42`.

use rand::RngExt;

const ADJECTIVES: &[&str] = &[
    "Shadow", "Neon", "Cyber", "Lunar", "Solar", "Frost", "Storm", "Pixel", "Ghost", "Turbo",
    "Cosmic", "Iron", "Velvet", "Crimson", "Silent", "Atomic", "Rapid", "Nova", "Onyx", "Cobalt",
];

const NOUNS: &[&str] = &[
    "Fox", "Wolf", "Hawk", "Raven", "Lynx", "Otter", "Falcon", "Panda", "Crab", "Owl", "Heron",
    "Mantis", "Kraken", "Moth", "Newt", "Crane", "Bison", "Reef", "Byte", "Node",
];

pub fn generate_nickname() -> String {
    let mut rng = rand::rng();
    let adj = ADJECTIVES[rng.random_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.random_range(0..NOUNS.len())];
    let num: u8 = rng.random_range(0..100);
    format!("{}{}{}", adj, noun, num)
}
