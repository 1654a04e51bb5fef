// A bracket is one complete set of winner picks packed into a single u64.
// Bit i holds the pick for game i: 0 means the top team of that game wins, 1 means the bottom
// team wins. Games are numbered round by round: round 0 takes bits 0..T/2, round 1 the next T/4
// bits, and so on up to the championship in the highest bit (bit 62 for a 64 team field).
// Brackets are never edited in place; a changed bracket is a new value.

use serde::Serialize;

/// Widest field the u64 encoding can hold: 6 rounds, 64 teams, 63 games.
pub const MAX_ROUNDS: usize = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Bracket {
    picks: u64,
}

impl Bracket {
    pub fn from_picks(picks: u64) -> Bracket {
        Bracket { picks }
    }

    pub fn picks(&self) -> u64 {
        self.picks
    }
}

/// Number of games played in `round` of a field with `rounds` rounds.
pub fn games_in_round(round: usize, rounds: usize) -> usize {
    1 << (rounds - 1 - round)
}

// Round 0 starts at bit 0, round 1 at T/2, round 2 at T/2 + T/4, ...
// which adds up to T - T/2^round.
pub fn round_offset(round: usize, rounds: usize) -> usize {
    (1 << rounds) - (1 << (rounds - round))
}

/// Display name for a round, counted back from the title game.
pub fn round_name(round: usize, rounds: usize) -> String {
    match rounds - 1 - round {
        0 => "Championship".to_string(),
        1 => "Final Four".to_string(),
        2 => "Elite 8".to_string(),
        3 => "Sweet 16".to_string(),
        _ => format!("Round {}", round + 1),
    }
}
