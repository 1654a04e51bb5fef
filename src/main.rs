use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, LevelFilter};
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Root};
use log4rs::encode::pattern::PatternEncoder;
use ncaa_odds::bracket::round_name;
use ncaa_odds::config::{generate_sample_config, Config, DEFAULT_PATHS};
use ncaa_odds::{ingest, CancelToken, Enumerator, ProbabilityModel, Report};
use ncaa_odds::{TeamList, Topology, Tournament};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "ncaa-odds",
    version,
    about = "Find the tournament results that win your bracket pool"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Check every remaining scenario for a bracket against the rest of the pool
    Run(RunArgs),
    /// Write a sample config file
    InitConfig {
        /// Where to write it
        #[arg(default_value = "ncaa-odds.yaml")]
        path: PathBuf,
    },
}

#[derive(Parser)]
struct RunArgs {
    /// Your bracket: one picked winner per line, in game order
    bracket: PathBuf,

    /// Path to config file (default: ./ncaa-odds.yaml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Team names in bracket order
    #[arg(long)]
    teams: Option<PathBuf>,

    /// Points per round
    #[arg(long)]
    points: Option<PathBuf>,

    /// Winners of the games played so far
    #[arg(long)]
    results: Option<PathBuf>,

    /// team,rating csv for weighting scenarios by likelihood
    #[arg(long)]
    ratings: Option<PathBuf>,

    /// Directory of rival brackets (default: the directory in the bracket path, if any)
    #[arg(long)]
    rivals: Option<PathBuf>,

    /// Worker threads, 0 for one per CPU
    #[arg(long)]
    threads: Option<usize>,

    /// Count a tie with the best rival as a win
    #[arg(long)]
    ties_win: bool,

    /// Stop after this many seconds and report partial results
    #[arg(long)]
    time_limit: Option<u64>,

    /// Output JSON instead of text
    #[arg(long)]
    json: bool,

    /// Print the bracket's picks round by round
    #[arg(long)]
    show_bracket: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args),
        Commands::InitConfig { path } => {
            if path.exists() {
                anyhow::bail!("{} already exists", path.display());
            }
            std::fs::write(&path, generate_sample_config())
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote sample configuration to {}", path.display());
            Ok(())
        }
    }
}

fn log_config(level: LevelFilter) -> Result<log4rs::config::Config> {
    // stdout is reserved for the report
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("{l} - {m}{n}")))
        .build();
    let config = log4rs::config::Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level))?;
    Ok(config)
}

fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(teams) = &args.teams {
        config.inputs.teams = teams.clone();
    }
    if let Some(points) = &args.points {
        config.inputs.points = points.clone();
    }
    if let Some(results) = &args.results {
        config.inputs.results = results.clone();
    }
    if let Some(ratings) = &args.ratings {
        config.inputs.ratings = Some(ratings.clone());
    }
    if let Some(rivals) = &args.rivals {
        config.inputs.rivals = Some(rivals.clone());
    }
    if let Some(threads) = args.threads {
        config.search.threads = threads;
    }
    if args.ties_win {
        config.search.ties_count_as_wins = true;
    }
    if let Some(secs) = args.time_limit {
        config.search.time_limit_secs = Some(secs);
    }
    if args.json {
        config.output.json = true;
    }
}

fn run(args: RunArgs) -> Result<()> {
    // logging comes up before the config is read so problems with the config are reported;
    // the level from the config file is applied once it is known
    let initial_level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let log_handle = log4rs::init_config(log_config(initial_level)?)?;

    let config_path = args.config.clone().or_else(|| Config::find_in("."));
    let mut config = match &config_path {
        Some(path) => {
            let config = Config::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?;
            info!("Loaded configuration from {}", path.display());
            config
        }
        None => Config::default(),
    };
    apply_overrides(&mut config, &args);

    if !args.verbose {
        let level: LevelFilter = config
            .output
            .log_level
            .parse()
            .with_context(|| format!("unknown log level '{}'", config.output.log_level))?;
        log_handle.set_config(log_config(level)?);
    }

    let inputs = &config.inputs;
    let teams = ingest::read_teams(&inputs.teams)
        .with_context(|| format!("reading teams from {}", inputs.teams.display()))?;
    let topology = Topology::for_team_count(teams.len())?;
    info!("Built tables for {} teams over {} rounds", topology.teams(), topology.rounds());

    let points = ingest::read_points(&inputs.points)
        .with_context(|| format!("reading points from {}", inputs.points.display()))?;
    let (results, played) = ingest::read_results(&inputs.results, &teams, &topology)
        .with_context(|| format!("reading results from {}", inputs.results.display()))?;
    let tournament = Tournament::new(&topology, points)?.with_results(results, played);

    let target = ingest::read_bracket(&args.bracket, &teams, &topology)
        .with_context(|| format!("reading bracket {}", args.bracket.display()))?;
    let current_score = tournament.score_bracket(&target);

    let ratings_path = ratings_path(inputs.ratings.as_deref());
    let rivals_dir = inputs
        .rivals
        .clone()
        .or_else(|| ingest::default_rivals_dir(&args.bracket));
    let rivals = match &rivals_dir {
        Some(dir) => {
            let mut exclude: Vec<&Path> = vec![
                args.bracket.as_path(),
                inputs.teams.as_path(),
                inputs.points.as_path(),
                inputs.results.as_path(),
            ];
            exclude.extend(ratings_path.as_deref());
            exclude.extend(config_path.as_deref());
            exclude.extend(DEFAULT_PATHS.iter().map(|name| Path::new(*name)));
            let rivals = ingest::read_rival_brackets(dir, &exclude, &teams, &topology)
                .with_context(|| format!("reading rival brackets from {}", dir.display()))?;
            info!("Loaded {} rival brackets from {}", rivals.len(), dir.display());
            rivals
        }
        None => {
            info!("No rivals directory; checking the bracket on its own");
            Vec::new()
        }
    };

    let model = load_model(ratings_path.as_deref(), &tournament, &teams)?;

    let json = config.output.json;
    if !json {
        println!("Current score: {}", current_score);
        if args.show_bracket {
            print_bracket(&teams, &topology, target.picks());
        }
    }

    let mut options = config.to_search_options();
    let token = CancelToken::new();
    options.cancel = Some(token.clone());
    if let Some(secs) = config.search.time_limit_secs {
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(secs));
            token.cancel();
        });
    }
    if !json {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {percent}% (eta {eta})")
                .progress_chars("=> "),
        );
        options.progress = Some(pb);
    }

    let rivals = rivals.into_iter().map(|(_, bracket)| bracket).collect();
    let mut enumerator = Enumerator::new(&tournament, target, rivals);
    if let Some(model) = &model {
        enumerator = enumerator.with_probability_model(model);
    }
    let stats = enumerator.run(&options);

    let report = Report::build(&stats, &teams, &topology, current_score, model.as_ref());
    if json {
        println!("{}", report.to_json()?);
    } else {
        report.print_text(&mut io::stdout().lock())?;
    }
    Ok(())
}

/// The configured ratings file, or ./ratings.csv when there is one.
fn ratings_path(configured: Option<&Path>) -> Option<PathBuf> {
    match configured {
        Some(path) => Some(path.to_path_buf()),
        None => Some(PathBuf::from("ratings.csv")).filter(|p| p.exists()),
    }
}

fn load_model(
    path: Option<&Path>,
    tournament: &Tournament,
    teams: &TeamList,
) -> Result<Option<ProbabilityModel>> {
    let path = match path {
        Some(path) => path,
        None => {
            info!("No ratings file; skipping win probability");
            return Ok(None);
        }
    };
    let ratings = ingest::read_ratings(path)
        .with_context(|| format!("reading ratings from {}", path.display()))?;
    let model = ProbabilityModel::from_ratings(tournament, teams, &ratings)
        .with_context(|| format!("building probabilities from {}", path.display()))?;
    info!("Loaded ratings for {} teams still alive", model.alive().len());
    Ok(Some(model))
}

fn print_bracket(teams: &TeamList, topology: &Topology, picks: u64) {
    let winners = teams.decode_winners(topology, picks);
    for round in 0..topology.rounds() {
        let start = topology.round_offset(round);
        let end = start + topology.games_in_round(round);
        let name = round_name(round, topology.rounds());
        println!("{}: {}", name, winners[start..end].join(", "));
    }
}
