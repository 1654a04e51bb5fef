// Turns the raw search tables into something a bracket owner can act on: the overall win rate,
// and for every team and round whether that team winning there locks in the win, kills it, or
// just helps.

use crate::bracket::round_name;
use crate::enumerator::ScenarioStats;
use crate::probability::ProbabilityModel;
use crate::teams::TeamList;
use crate::topology::Topology;
use serde::Serialize;
use std::cmp::Ordering;
use std::io::{self, Write};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalKind {
    /// every remaining scenario where the team wins this round is a win for the bracket
    Clinch,
    /// no remaining scenario where the team wins this round is a win
    Eliminated,
    /// the team winning this round raises the win rate above the overall rate
    Improved { rate: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub team: String,
    pub round: usize,
    pub round_name: String,
    #[serde(flatten)]
    pub kind: SignalKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub current_score: u32,
    pub candidates: u64,
    pub scenarios: u64,
    pub wins: u64,
    pub win_rate: f64,
    /// Present when the search ran with a probability model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub win_probability: Option<f64>,
    pub cancelled: bool,
    pub signals: Vec<Signal>,
}

impl Report {
    /// `model` is the probability model the search ran with, if any; without one there is no
    /// win probability to report.
    pub fn build(
        stats: &ScenarioStats,
        teams: &TeamList,
        topology: &Topology,
        current_score: u32,
        model: Option<&ProbabilityModel>,
    ) -> Report {
        let win_rate = stats.win_rate();
        let mut signals = Vec::new();
        let mut improved = Vec::new();

        if stats.wins > 0 {
            for team in 0..topology.teams() {
                for round in 0..topology.rounds() {
                    let total = stats.reached(team, round);
                    let wins = stats.reached_in_wins(team, round);
                    let kind = if wins == total && wins > 0 {
                        SignalKind::Clinch
                    } else if wins == 0 && total > 0 {
                        SignalKind::Eliminated
                    } else if total > 0 && wins as f64 / total as f64 > win_rate {
                        SignalKind::Improved {
                            rate: wins as f64 / total as f64,
                        }
                    } else {
                        continue;
                    };
                    let signal = Signal {
                        team: teams.name(team).to_string(),
                        round,
                        round_name: round_name(round, topology.rounds()),
                        kind,
                    };
                    match kind {
                        SignalKind::Improved { .. } => improved.push(signal),
                        _ => signals.push(signal),
                    }
                }
            }
        }

        // stable, so equal rates keep team order
        improved.sort_by(|a, b| rate_of(b).partial_cmp(&rate_of(a)).unwrap_or(Ordering::Equal));
        signals.extend(improved);

        Report {
            current_score,
            candidates: stats.candidates,
            scenarios: stats.scenarios,
            wins: stats.wins,
            win_rate,
            win_probability: model.map(|_| stats.win_probability),
            cancelled: stats.cancelled,
            signals,
        }
    }

    pub fn print_text<W: Write>(&self, out: &mut W) -> io::Result<()> {
        if self.cancelled {
            writeln!(
                out,
                "Search stopped early; only {} candidates were checked",
                self.candidates
            )?;
        }
        writeln!(
            out,
            "You win {} out of {} different scenarios: {:.3}",
            self.wins, self.scenarios, self.win_rate
        )?;
        if let Some(prob) = self.win_probability {
            writeln!(out, "Your chances of winning are {:.3}", prob)?;
        }
        for signal in &self.signals {
            match signal.kind {
                SignalKind::Clinch => writeln!(
                    out,
                    "Clinch win with {} winning in {}",
                    signal.team, signal.round_name
                )?,
                SignalKind::Eliminated => writeln!(
                    out,
                    "Eliminated with {} winning in {}",
                    signal.team, signal.round_name
                )?,
                SignalKind::Improved { rate } => writeln!(
                    out,
                    "{} winning in {} gives win rate {:.3}",
                    signal.team, signal.round_name, rate
                )?,
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn rate_of(signal: &Signal) -> f64 {
    match signal.kind {
        SignalKind::Improved { rate } => rate,
        _ => 0.0,
    }
}
