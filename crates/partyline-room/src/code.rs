//! Random room code generation.

use partyline_protocol::RoomCode;
use rand::Rng;

/// Draws one code uniformly from the 24³ codespace.
fn random_code<R: Rng>(rng: &mut R) -> RoomCode {
    RoomCode::from_indices(std::array::from_fn(|_| {
        rng.random_range(0..RoomCode::ALPHABET.len())
    }))
}

/// Samples codes until one is not `taken`.
///
/// The caller must make sure at least one code is free, otherwise this
/// never returns.
pub(crate) fn generate_unique_code(taken: impl Fn(&RoomCode) -> bool) -> RoomCode {
    let mut rng = rand::rng();
    loop {
        let code = random_code(&mut rng);
        if !taken(&code) {
            return code;
        }
    }
}
