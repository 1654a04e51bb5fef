// Head to head win probabilities for the teams still alive, from team strength ratings.
// Uses the 538 style logistic curve on the rating difference. Only alive teams get entries,
// since only their future games are still undecided.

use crate::error::{BracketError, Result};
use crate::teams::TeamList;
use crate::tournament::Tournament;
use crate::topology::Topology;
use std::collections::HashMap;

/// Rating points per factor of 10 in the odds
const RATING_SCALE: f64 = 30.464 / 400.0;

/// Probability that a team rated `rating_a` beats a team rated `rating_b`.
pub fn win_probability(rating_a: f64, rating_b: f64) -> f64 {
    1.0 / (1.0 + 10.0f64.powf((rating_b - rating_a) * RATING_SCALE))
}

#[derive(Debug, Clone)]
pub struct ProbabilityModel {
    teams: usize,
    alive: Vec<usize>,
    /// probs[a * teams + b] = probability that a beats b
    probs: Vec<f64>,
}

impl ProbabilityModel {
    /// Ratings are only looked up for teams that haven't lost a recorded game.
    pub fn from_ratings(
        tournament: &Tournament,
        team_list: &TeamList,
        ratings: &HashMap<String, f64>,
    ) -> Result<ProbabilityModel> {
        for name in ratings.keys() {
            team_list.index_of(name)?;
        }

        let alive = tournament.alive_teams();
        let mut alive_ratings = Vec::with_capacity(alive.len());
        for &team in &alive {
            let name = team_list.name(team);
            let rating = *ratings
                .get(name)
                .ok_or_else(|| BracketError::MissingRating(name.to_string()))?;
            if !rating.is_finite() {
                return Err(BracketError::InvalidRating { team: name.to_string(), value: rating });
            }
            alive_ratings.push(rating);
        }

        let teams = tournament.topology().teams();
        let mut probs = vec![0.0f64; teams * teams];
        for (i, &team_a) in alive.iter().enumerate() {
            for (j, &team_b) in alive.iter().enumerate() {
                if i != j {
                    probs[team_a * teams + team_b] =
                        win_probability(alive_ratings[i], alive_ratings[j]);
                }
            }
        }

        Ok(ProbabilityModel { teams, alive, probs })
    }

    pub fn alive(&self) -> &[usize] {
        &self.alive
    }

    #[inline(always)]
    pub fn get(&self, team_a: usize, team_b: usize) -> f64 {
        self.probs[team_a * self.teams + team_b]
    }

    /// Likelihood of one complete outcome: the product of every head to head result between alive
    /// teams that the outcome contains.
    pub fn scenario_probability(&self, topology: &Topology, outcome: u64) -> f64 {
        let mut prob = 1.0;
        for &team_a in &self.alive {
            for &team_b in &self.alive {
                if team_a != team_b && topology.beat(outcome, team_a, team_b) {
                    prob *= self.get(team_a, team_b);
                }
            }
        }
        prob
    }
}
