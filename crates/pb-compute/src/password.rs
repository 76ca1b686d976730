use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};

const LOWER: &[u8] = b"abcdefghijkmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const DIGITS: &[u8] = b"23456789";

pub const PASSWORD_LENGTH: usize = 12;

/// Random password with at least one lowercase letter, uppercase letter and digit.
pub fn generate() -> String {
    let mut rng = rand::rng();
    let pools = [LOWER, UPPER, DIGITS];

    let mut chars: Vec<u8> = pools
        .iter()
        .filter_map(|pool| pool.choose(&mut rng).copied())
        .collect();
    while chars.len() < PASSWORD_LENGTH {
        let pool = pools[rng.random_range(0..pools.len())];
        if let Some(&c) = pool.choose(&mut rng) {
            chars.push(c);
        }
    }
    chars.shuffle(&mut rng);

    chars.into_iter().map(char::from).collect()
}
