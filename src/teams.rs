// The ordered team list and the conversion from lists of winner names into bit patterns.
// A team's position in the list is its slot in the bracket: teams 0 and 1 meet in game 0,
// teams 2 and 3 in game 1, and so on.
//
// A winner list names the winner of every game in game order. A team that won three games shows up
// three times, so the number of occurrences is how far the team advanced.

use crate::error::{BracketError, Result};
use crate::topology::Topology;
use fnv::FnvHashMap;

/// How the encoder treats names that aren't on the team list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Every entry must name a team. Used for bracket picks.
    Strict,
    /// Blank entries mean "not played yet" and are skipped; any other unknown name still fails.
    /// Used for recorded results.
    AllowBlank,
}

#[derive(Debug, Clone)]
pub struct TeamList {
    names: Vec<String>,
    lookup: FnvHashMap<String, usize>,
}

impl TeamList {
    pub fn new(names: Vec<String>) -> Result<TeamList> {
        let count = names.len();
        if count < 2 || !count.is_power_of_two() || count > 64 {
            return Err(BracketError::InvalidTeamCount(count));
        }
        let names: Vec<String> = names.into_iter().map(|n| n.trim().to_string()).collect();
        let mut lookup = FnvHashMap::with_capacity_and_hasher(count, Default::default());
        for (idx, name) in names.iter().enumerate() {
            if lookup.insert(name.clone(), idx).is_some() {
                return Err(BracketError::DuplicateTeam(name.clone()));
            }
        }
        Ok(TeamList { names, lookup })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, idx: usize) -> &str {
        &self.names[idx]
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.lookup
            .get(name.trim())
            .copied()
            .ok_or_else(|| BracketError::UnknownTeam(name.trim().to_string()))
    }

    /// Converts a winner list into an outcome bit pattern.
    ///
    /// Each team's occurrence count picks the round it reached, and that round's value is merged in
    /// under its mask. Two entries that disagree about a game are rejected.
    pub fn encode_winners<S: AsRef<str>>(
        &self,
        topology: &Topology,
        winners: &[S],
        mode: MatchMode,
    ) -> Result<u64> {
        if winners.len() > topology.games() {
            return Err(BracketError::TooManyWinners {
                expected: topology.games(),
                found: winners.len(),
            });
        }

        // (team, wins) in order of first appearance
        let mut tallies: Vec<(usize, usize)> = Vec::new();
        let mut positions: FnvHashMap<usize, usize> = FnvHashMap::default();
        for winner in winners {
            let name = winner.as_ref().trim();
            let team = match self.index_of(name) {
                Ok(team) => team,
                // a blank line is an unplayed game when blanks are allowed
                Err(e) if e.is_unknown_team() && name.is_empty() => {
                    if mode == MatchMode::AllowBlank {
                        continue;
                    }
                    return Err(e);
                }
                Err(e) => return Err(e),
            };
            match positions.get(&team) {
                Some(&pos) => tallies[pos].1 += 1,
                None => {
                    positions.insert(team, tallies.len());
                    tallies.push((team, 1));
                }
            }
        }

        let mut result = 0u64;
        let mut claimed = 0u64;
        for (team, wins) in tallies {
            if wins > topology.rounds() {
                return Err(BracketError::TooManyWins {
                    team: self.names[team].clone(),
                    wins,
                    rounds: topology.rounds(),
                });
            }
            let mask = topology.mask(team, wins - 1);
            let value = topology.value(team, wins - 1);
            if (result ^ value) & mask & claimed != 0 {
                return Err(BracketError::ConflictingWinners(self.names[team].clone()));
            }
            result ^= (result ^ value) & mask;
            claimed |= mask;
        }
        Ok(result)
    }

    /// Bit i is set when line i of a results list names a known team.
    pub fn played_mask<S: AsRef<str>>(&self, topology: &Topology, winners: &[S]) -> Result<u64> {
        if winners.len() > topology.games() {
            return Err(BracketError::TooManyWinners {
                expected: topology.games(),
                found: winners.len(),
            });
        }
        Ok(winners
            .iter()
            .enumerate()
            .filter(|(_, w)| self.lookup.contains_key(w.as_ref().trim()))
            .fold(0u64, |mask, (game, _)| mask | 1u64 << game))
    }

    /// Inverse of `encode_winners` for a complete outcome: the winner name of every game.
    pub fn decode_winners(&self, topology: &Topology, outcome: u64) -> Vec<&str> {
        topology
            .winners(outcome)
            .into_iter()
            .map(|team| self.name(team))
            .collect()
    }
}
