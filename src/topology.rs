// Precomputed bit patterns describing the shape of a single elimination bracket.
// For every team and round we store a mask of the games that team must win to get through that
// round, and the value those bits must hold. For every pair of teams we store the mask/value
// pair for "the first team beats the second team in the only game they could ever meet in".
// The tables are built once from the round count and only read afterwards, so one Topology can be
// shared by reference across threads.

use crate::bracket::{self, MAX_ROUNDS};
use crate::error::{BracketError, Result};

#[derive(Debug, Clone)]
pub struct Topology {
    rounds: usize,
    teams: usize,
    /// masks[team * rounds + round]
    masks: Vec<u64>,
    values: Vec<u64>,
    /// h2h_masks[a * teams + b], zero on the diagonal
    h2h_masks: Vec<u64>,
    h2h_values: Vec<u64>,
    meeting_rounds: Vec<usize>,
}

impl Topology {
    pub fn new(rounds: usize) -> Result<Topology> {
        if rounds == 0 || rounds > MAX_ROUNDS {
            return Err(BracketError::InvalidTeamCount(
                1usize.checked_shl(rounds as u32).unwrap_or(0),
            ));
        }
        let teams = 1usize << rounds;

        let mut masks = vec![0u64; teams * rounds];
        let mut values = vec![0u64; teams * rounds];
        for team in 0..teams {
            for round in 0..rounds {
                masks[team * rounds + round] = generate_mask(team, round, rounds);
                values[team * rounds + round] = generate_value(team, round, rounds);
            }
        }

        let mut topology = Topology {
            rounds,
            teams,
            masks,
            values,
            h2h_masks: vec![0u64; teams * teams],
            h2h_values: vec![0u64; teams * teams],
            meeting_rounds: vec![0usize; teams * teams],
        };
        topology.generate_head_to_head();
        Ok(topology)
    }

    /// Builds the tables for a field of `teams` teams, which must be a power of two.
    pub fn for_team_count(teams: usize) -> Result<Topology> {
        if teams < 2 || !teams.is_power_of_two() || teams > 1 << MAX_ROUNDS {
            return Err(BracketError::InvalidTeamCount(teams));
        }
        Topology::new(teams.trailing_zeros() as usize)
    }

    fn generate_head_to_head(&mut self) {
        for team1 in 0..self.teams {
            for team2 in (team1 + 1)..self.teams {
                // the two teams can only ever meet in one game: the round where
                // their paths share exactly one bit
                for round in (0..self.rounds).rev() {
                    let shared = self.mask(team1, round) & self.mask(team2, round);
                    if shared.count_ones() == 1 {
                        let mask = self.mask(team1, round) | self.mask(team2, round);
                        let forward = team1 * self.teams + team2;
                        let backward = team2 * self.teams + team1;
                        self.h2h_masks[forward] = mask;
                        self.h2h_masks[backward] = mask;
                        self.h2h_values[forward] = self.merge_h2h_value(team1, team2, round);
                        self.h2h_values[backward] = self.merge_h2h_value(team2, team1, round);
                        self.meeting_rounds[forward] = round;
                        self.meeting_rounds[backward] = round;
                        break;
                    }
                }
            }
        }
    }

    // masked merge: the loser's pattern everywhere except under the winner's mask
    fn merge_h2h_value(&self, winner: usize, loser: usize, round: usize) -> u64 {
        let winner_value = self.value(winner, round);
        let winner_mask = self.mask(winner, round);
        let loser_value = self.value(loser, round);
        loser_value ^ ((loser_value ^ winner_value) & winner_mask)
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn teams(&self) -> usize {
        self.teams
    }

    pub fn games(&self) -> usize {
        self.teams - 1
    }

    pub fn games_in_round(&self, round: usize) -> usize {
        bracket::games_in_round(round, self.rounds)
    }

    pub fn round_offset(&self, round: usize) -> usize {
        bracket::round_offset(round, self.rounds)
    }

    /// One bit set for every game in the tournament.
    pub fn all_games_mask(&self) -> u64 {
        u64::MAX >> (64 - self.games())
    }

    #[inline(always)]
    pub fn mask(&self, team: usize, round: usize) -> u64 {
        self.masks[team * self.rounds + round]
    }

    #[inline(always)]
    pub fn value(&self, team: usize, round: usize) -> u64 {
        self.values[team * self.rounds + round]
    }

    #[inline(always)]
    pub fn h2h_mask(&self, team_a: usize, team_b: usize) -> u64 {
        self.h2h_masks[team_a * self.teams + team_b]
    }

    #[inline(always)]
    pub fn h2h_value(&self, team_a: usize, team_b: usize) -> u64 {
        self.h2h_values[team_a * self.teams + team_b]
    }

    /// Round of the only game `team_a` and `team_b` could play each other in.
    pub fn meeting_round(&self, team_a: usize, team_b: usize) -> usize {
        assert!(team_a != team_b, "A team never meets itself");
        self.meeting_rounds[team_a * self.teams + team_b]
    }

    /// true if `team` won every game it needed to get through `round` in `outcome`
    #[inline(always)]
    pub fn advanced(&self, outcome: u64, team: usize, round: usize) -> bool {
        outcome & self.mask(team, round) == self.value(team, round)
    }

    /// true if `outcome` has `team_a` beating `team_b` head to head
    #[inline(always)]
    pub fn beat(&self, outcome: u64, team_a: usize, team_b: usize) -> bool {
        outcome & self.h2h_mask(team_a, team_b) == self.h2h_value(team_a, team_b)
    }

    /// A team is out once any fully played stretch of its path went against it.
    pub fn eliminated(&self, results: u64, played: u64, team: usize) -> bool {
        (0..self.rounds).any(|round| {
            let mask = self.mask(team, round);
            played & mask == mask && results & mask != self.value(team, round)
        })
    }

    /// Decodes a full outcome into the winning team index of every game, in game order.
    pub fn winners(&self, outcome: u64) -> Vec<usize> {
        let mut winners = Vec::with_capacity(self.games());
        let mut alive: Vec<usize> = (0..self.teams).collect();
        for round in 0..self.rounds {
            let offset = self.round_offset(round);
            let next: Vec<usize> = alive
                .chunks(2)
                .enumerate()
                .map(|(game, pair)| {
                    if outcome & (1u64 << (offset + game)) == 0 {
                        pair[0]
                    } else {
                        pair[1]
                    }
                })
                .collect();
            winners.extend_from_slice(&next);
            alive = next;
        }
        winners
    }
}

// Folds the team's slot up the bracket one round at a time. At each level the game index is
// slot / 2 and the team is on the bottom of that game when slot is odd.
fn generate_mask(team: usize, round: usize, rounds: usize) -> u64 {
    let mut slot = team;
    let mut mask = 1u64 << (slot / 2);
    let mut shift = 0;
    for i in 0..round {
        slot /= 2;
        shift += bracket::games_in_round(i, rounds);
        mask |= 1u64 << (shift + slot / 2);
    }
    mask
}

fn generate_value(team: usize, round: usize, rounds: usize) -> u64 {
    let mut slot = team;
    let mut value = ((slot % 2) as u64) << (slot / 2);
    let mut shift = 0;
    for i in 0..round {
        slot /= 2;
        shift += bracket::games_in_round(i, rounds);
        value |= ((slot % 2) as u64) << (shift + slot / 2);
    }
    value
}
