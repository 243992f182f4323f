use rand::Rng;

pub const ID_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// 22 symbols of a 62-letter alphabet, roughly 131 bits.
pub const BRICK_ID_LEN: usize = 22;
pub const CREATION_ID_LEN: usize = 20;

pub fn generate_brick_id() -> String {
    random_token(BRICK_ID_LEN)
}

pub fn generate_creation_id() -> String {
    random_token(CREATION_ID_LEN)
}

pub fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    let alphabet = ID_ALPHABET.as_bytes();
    let mut id = String::with_capacity(len);
    for _ in 0..len {
        let idx = rng.random_range(0..alphabet.len());
        id.push(alphabet[idx] as char);
    }
    id
}

pub fn is_valid_token(value: &str, len: usize) -> bool {
    if value.len() != len {
        return false;
    }
    value.chars().all(|ch| ID_ALPHABET.contains(ch))
}
