// Tournament state: the recorded results, which games have been played, and the points per round.
// Scoring walks every team from the last round down and credits the deepest round where both the
// outcome and the bracket have that team advancing. A team credited through round r earns the
// points of rounds 0..=r, since picking it there means it was picked in every earlier round too.

use crate::bracket::Bracket;
use crate::error::{BracketError, Result};
use crate::topology::Topology;

#[derive(Debug, Clone)]
pub struct Tournament<'t> {
    topology: &'t Topology,
    points_per_round: Vec<u32>,
    /// cumulative_points[r] = points_per_round[0] + ... + points_per_round[r]
    cumulative_points: Vec<u32>,
    max_score: u32,
    results: u64,
    played: u64,
}

impl<'t> Tournament<'t> {
    /// Fails when the point count doesn't match the round count, or when a perfect bracket's
    /// score wouldn't fit in a u32. Every bracket scores at most that much, so scoring itself
    /// can't overflow.
    pub fn new(topology: &'t Topology, points_per_round: Vec<u32>) -> Result<Tournament<'t>> {
        if points_per_round.len() != topology.rounds() {
            return Err(BracketError::PointCountMismatch {
                expected: topology.rounds(),
                found: points_per_round.len(),
            });
        }

        let mut cumulative_points = Vec::with_capacity(points_per_round.len());
        let mut total = 0u32;
        let mut max_score = 0u32;
        for (round, &points) in points_per_round.iter().enumerate() {
            let games = topology.games_in_round(round) as u32;
            total = total.checked_add(points).ok_or(BracketError::PointsOverflow)?;
            max_score = points
                .checked_mul(games)
                .and_then(|round_total| max_score.checked_add(round_total))
                .ok_or(BracketError::PointsOverflow)?;
            cumulative_points.push(total);
        }

        Ok(Tournament {
            topology,
            points_per_round,
            cumulative_points,
            max_score,
            results: 0,
            played: 0,
        })
    }

    pub fn with_results(mut self, results: u64, played: u64) -> Tournament<'t> {
        self.results = results;
        self.played = played;
        self
    }

    pub fn topology(&self) -> &'t Topology {
        self.topology
    }

    pub fn results(&self) -> u64 {
        self.results
    }

    pub fn played(&self) -> u64 {
        self.played
    }

    pub fn points_per_round(&self) -> &[u32] {
        &self.points_per_round
    }

    /// Score with only the games played so far. A team's run through a round only counts once
    /// every game on that run has a recorded result.
    pub fn score_bracket(&self, bracket: &Bracket) -> u32 {
        let picks = bracket.picks();
        let topology = self.topology;
        let mut score = 0;
        for team in 0..topology.teams() {
            for round in (0..topology.rounds()).rev() {
                let mask = topology.mask(team, round);
                let value = topology.value(team, round);
                let finished = self.played & mask == mask;
                if finished && self.results & mask == value && picks & mask == value {
                    score += self.cumulative_points[round];
                    break;
                }
            }
        }
        score
    }

    /// Score against the stored results as if every game had been played.
    pub fn score_finished_bracket(&self, bracket: &Bracket) -> u32 {
        self.score_outcome(self.results, bracket)
    }

    /// Score a bracket against a complete hypothetical outcome. Doesn't touch the stored results,
    /// so any number of threads can evaluate different outcomes against one Tournament.
    #[inline]
    pub fn score_outcome(&self, outcome: u64, bracket: &Bracket) -> u32 {
        let picks = bracket.picks();
        let topology = self.topology;
        let mut score = 0;
        for team in 0..topology.teams() {
            for round in (0..topology.rounds()).rev() {
                let mask = topology.mask(team, round);
                let value = topology.value(team, round);
                if outcome & mask == value && picks & mask == value {
                    score += self.cumulative_points[round];
                    break;
                }
            }
        }
        score
    }

    /// Score of a perfect bracket: every game's points.
    pub fn max_score(&self) -> u32 {
        self.max_score
    }

    /// Teams that haven't lost a recorded game.
    pub fn alive_teams(&self) -> Vec<usize> {
        (0..self.topology.teams())
            .filter(|&team| !self.topology.eliminated(self.results, self.played, team))
            .collect()
    }
}
