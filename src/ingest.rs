// Readers for the flat files a pool is described with. Everything is one entry per line:
//   teams.txt    team names in bracket order
//   points.txt   points per correct pick, one line per round
//   results.txt  winner of each game in game order, blank line = not played yet
//   <bracket>    a bracket's picked winner for every game, in game order
//   ratings.csv  team,rating with no header row

use crate::bracket::Bracket;
use crate::error::{BracketError, Result};
use crate::teams::{MatchMode, TeamList};
use crate::topology::Topology;
use log::debug;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Lines of a text file with line endings and trailing blank lines removed.
pub fn read_lines<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    let mut lines: Vec<String> = content.lines().map(|l| l.trim_end().to_string()).collect();
    while lines.last().map_or(false, |l| l.is_empty()) {
        lines.pop();
    }
    Ok(lines)
}

pub fn read_teams<P: AsRef<Path>>(path: P) -> Result<TeamList> {
    let names = read_lines(path)?.into_iter().filter(|l| !l.trim().is_empty()).collect();
    TeamList::new(names)
}

pub fn read_points<P: AsRef<Path>>(path: P) -> Result<Vec<u32>> {
    read_lines(path)?
        .iter()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            line.trim().parse::<u32>().map_err(|_| BracketError::InvalidPointValue {
                line: idx + 1,
                value: line.trim().to_string(),
            })
        })
        .collect()
}

/// Recorded results and the mask of games they cover.
pub fn read_results<P: AsRef<Path>>(
    path: P,
    teams: &TeamList,
    topology: &Topology,
) -> Result<(u64, u64)> {
    let winners = read_lines(path)?;
    let results = teams.encode_winners(topology, &winners, MatchMode::AllowBlank)?;
    let played = teams.played_mask(topology, &winners)?;
    debug!("{} of {} games played", played.count_ones(), topology.games());
    Ok((results, played))
}

pub fn read_bracket<P: AsRef<Path>>(
    path: P,
    teams: &TeamList,
    topology: &Topology,
) -> Result<Bracket> {
    let picks = read_lines(path)?;
    if picks.len() < topology.games() {
        return Err(BracketError::IncompleteBracket {
            expected: topology.games(),
            found: picks.len(),
        });
    }
    Ok(Bracket::from_picks(teams.encode_winners(topology, &picks, MatchMode::Strict)?))
}

/// Where rival brackets live when no directory is configured: the directory the target bracket
/// was named in. A bare file name names no directory, so there are no rivals to read.
pub fn default_rivals_dir<P: AsRef<Path>>(bracket: P) -> Option<PathBuf> {
    bracket
        .as_ref()
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

/// Every regular file in `dir` except the ones in `exclude` (the target bracket and the other
/// input files), read as a bracket, in file name order.
pub fn read_rival_brackets<P: AsRef<Path>>(
    dir: P,
    exclude: &[&Path],
    teams: &TeamList,
    topology: &Topology,
) -> Result<Vec<(String, Bracket)>> {
    let exclude: Vec<PathBuf> = exclude
        .iter()
        .map(|p| fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf()))
        .collect();
    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if fs::canonicalize(&path).map_or(false, |p| exclude.contains(&p)) {
            continue;
        }
        paths.push(path);
    }
    paths.sort_by_key(|p| p.file_name().map(|n| n.to_os_string()));

    let mut brackets = Vec::with_capacity(paths.len());
    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bracket = read_bracket(&path, teams, topology)?;
        debug!("Read rival bracket {}", name);
        brackets.push((name, bracket));
    }
    Ok(brackets)
}

pub fn read_ratings<P: AsRef<Path>>(path: P) -> Result<HashMap<String, f64>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)?;
    let mut ratings = HashMap::new();
    for record in rdr.deserialize() {
        let (team, rating): (String, f64) = record?;
        ratings.insert(team, rating);
    }
    Ok(ratings)
}
