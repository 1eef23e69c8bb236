//! Command-line front end for the finsent pipeline

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};
use log::{info, warn};
use std::path::{Path, PathBuf};

use finsent::config::{generate_commented_config_template, Config};
use finsent::features::store::{read_features, read_scored, write_features, write_joined, write_scored};
use finsent::news::{dominant_ticker, filter_ticker, filter_window, latest_headlines_file, load_headlines};
use finsent::pipeline::{
    assign_and_aggregate, build_features, evaluate_run, fetch_prices_for, price_provider_from_config,
    scorer_from_config, FeatureOptions, FeatureRun,
};
use finsent::utils::{ensure_dir, init_logging, latest_with_prefix, table_path, ticker_from_table_path};
use finsent::utils::types::DailyFeatureRow;

#[derive(Debug, Parser)]
#[command(name = "finsent", author, version, about = "News sentiment to next-session returns", long_about = None)]
struct Args {
    /// Path to the configuration file (TOML); defaults to ./finsent.toml or the user config dir
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter when FINSENT_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Print the default configuration to stdout and exit
    #[arg(long)]
    print_default_config: bool,

    /// Command to execute
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write a commented configuration file and create the data directories
    Init {
        /// Output path for the config file
        #[arg(long, default_value = "finsent.toml")]
        output: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Score headlines and build daily features
    Features(FeaturesArgs),
    /// Join daily features with prices and print signal metrics
    Evaluate(EvaluateArgs),
    /// Build features, then evaluate them
    Run {
        #[command(flatten)]
        features: FeaturesArgs,
        /// Daily price CSV (overrides [prices])
        #[arg(long, value_name = "CSV")]
        prices: Option<PathBuf>,
    },
}

#[derive(Debug, ClapArgs)]
struct FeaturesArgs {
    /// Headline CSV (time,source,ticker,title,url); defaults to the newest file in the data dirs
    #[arg(long, value_name = "CSV")]
    headlines: Option<PathBuf>,
    /// Previously scored headlines; skips scoring
    #[arg(long, value_name = "CSV", conflicts_with = "headlines")]
    scored: Option<PathBuf>,
    /// Ticker to keep; defaults to the most frequent one
    #[arg(long)]
    ticker: Option<String>,
    /// Override exchange.lag_minutes
    #[arg(long, allow_hyphen_values = true)]
    lag_minutes: Option<i64>,
    /// First UTC day of headlines to keep (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    start: Option<NaiveDate>,
    /// Last UTC day of headlines to keep, inclusive (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    end: Option<NaiveDate>,
    /// Output directory (defaults to data.intermediate_dir)
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,
}

impl FeaturesArgs {
    /// `[start, end)` instants covering `--start ..= --end` as whole UTC days
    fn window(&self) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        if self.start.is_none() && self.end.is_none() {
            return Ok(None);
        }
        let midnight = |d: NaiveDate| d.and_hms_opt(0, 0, 0).map(|t| Utc.from_utc_datetime(&t));
        let start = match self.start {
            | Some(d) => midnight(d),
            | None => Some(DateTime::<Utc>::MIN_UTC),
        };
        let end = match self.end {
            | Some(d) => d.succ_opt().and_then(midnight),
            | None => Some(DateTime::<Utc>::MAX_UTC),
        };
        match (start, end) {
            | (Some(start), Some(end)) if start < end => Ok(Some((start, end))),
            | _ => Err(anyhow!("--start must not be after --end")),
        }
    }
}

#[derive(Debug, ClapArgs)]
struct EvaluateArgs {
    /// Daily features CSV; defaults to the newest features_daily_<T>.csv
    #[arg(long, value_name = "CSV")]
    features: Option<PathBuf>,
    /// Ticker for the price lookup; defaults to the one in the features file name
    #[arg(long)]
    ticker: Option<String>,
    /// Daily price CSV (overrides [prices])
    #[arg(long, value_name = "CSV")]
    prices: Option<PathBuf>,
    /// Output directory (defaults to data.intermediate_dir)
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let cfg = match path {
        | Some(p) => Config::from_file(p).with_context(|| format!("Failed to load configuration {}", p.display()))?,
        | None => Config::load().context("Failed to load configuration")?,
    };
    cfg.validate().context("Invalid configuration")?;
    Ok(cfg)
}

async fn run_features(cfg: &Config, args: &FeaturesArgs) -> Result<(String, FeatureRun)> {
    let session = cfg.session()?;
    let mut opts = FeatureOptions::from_config(cfg);
    if let Some(lag) = args.lag_minutes {
        opts.lag_minutes = lag;
    }
    let out_dir = args.out_dir.clone().unwrap_or_else(|| cfg.data.intermediate_path());

    let (ticker, run) = if let Some(scored_path) = &args.scored {
        let load = read_scored(scored_path, cfg.labels.unknown_policy)
            .with_context(|| format!("Failed to read scored headlines {}", scored_path.display()))?;
        let headlines: Vec<_> = load.rows.iter().map(|r| r.headline.clone()).collect();
        let ticker = match &args.ticker {
            | Some(t) => t.trim().to_uppercase(),
            | None => dominant_ticker(&headlines)?,
        };
        let window = args.window()?;
        let rows = load
            .rows
            .into_iter()
            .filter(|r| r.headline.ticker == ticker)
            .filter(|r| window.map_or(true, |(start, end)| r.headline.timestamp >= start && r.headline.timestamp < end))
            .collect();
        let mut run = assign_and_aggregate(rows, &session, opts.lag_minutes)?;
        run.dropped_unparseable += load.dropped_unparseable;
        (ticker, run)
    } else {
        let path = match &args.headlines {
            | Some(p) => p.clone(),
            | None => latest_headlines_file(&cfg.data.raw_path(), &cfg.data.intermediate_path())?,
        };
        info!("Using headlines: {}", path.display());
        let batch = load_headlines(&path).with_context(|| format!("Failed to load headlines {}", path.display()))?;
        let ticker = match &args.ticker {
            | Some(t) => t.trim().to_uppercase(),
            | None => dominant_ticker(&batch.headlines)?,
        };
        info!("Building features for: {}", ticker);
        let mut headlines = filter_ticker(batch.headlines, &ticker);
        if let Some((start, end)) = args.window()? {
            let before = headlines.len();
            headlines = filter_window(headlines, start, end);
            info!("Kept {} of {} headlines between {} and {}", headlines.len(), before, start, end);
        }

        let scorer = scorer_from_config(cfg).await.context("Failed to open sentiment scorer")?;
        let mut run = build_features(headlines, scorer.as_ref(), &session, &opts).await?;
        drop(scorer);
        run.dropped_unparseable += batch.dropped_unparseable;

        write_scored(table_path(&out_dir, "scored_headlines", &ticker), &run.assignments)?;
        (ticker, run)
    };

    let out = table_path(&out_dir, "features_daily", &ticker);
    write_features(&out, &run.features)?;
    println!(
        "Saved features: {} ({} days from {} headlines, {} dropped)",
        out.display(),
        run.features.len(),
        run.retained,
        run.dropped_unparseable
    );
    Ok((ticker, run))
}

async fn run_evaluation(
    cfg: &Config,
    ticker: &str,
    features: &[DailyFeatureRow],
    prices: Option<&Path>,
    out_dir: &Path,
) -> Result<()> {
    let provider = price_provider_from_config(cfg, prices)?;
    let bars = fetch_prices_for(provider.as_ref(), ticker, features, cfg.prices.padding_days)
        .await
        .with_context(|| format!("Failed to load prices for {}", ticker))?;
    let eval = evaluate_run(features, &bars, cfg.prices.prefer_adj_close);

    let out = table_path(out_dir, "features_joined", ticker);
    write_joined(&out, &eval.joined)?;
    println!("Saved joined: {}", out.display());
    eval.metrics.print();
    Ok(())
}

async fn run_evaluate(cfg: &Config, args: &EvaluateArgs) -> Result<()> {
    let out_dir = args.out_dir.clone().unwrap_or_else(|| cfg.data.intermediate_path());
    let path = match &args.features {
        | Some(p) => p.clone(),
        | None => latest_with_prefix(&cfg.data.intermediate_path(), "features_daily_")?
            .ok_or_else(|| anyhow!("No features_daily_*.csv found; run `finsent features` first"))?,
    };
    let ticker = match &args.ticker {
        | Some(t) => t.trim().to_uppercase(),
        | None => ticker_from_table_path(&path, "features_daily_")
            .ok_or_else(|| anyhow!("Cannot infer ticker from {}; pass --ticker", path.display()))?,
    };
    info!("Using features: {} (ticker {})", path.display(), ticker);
    let features = read_features(&path).with_context(|| format!("Failed to read features {}", path.display()))?;
    if features.is_empty() {
        warn!("{} has no rows", path.display());
    }
    run_evaluation(cfg, &ticker, &features, args.prices.as_deref(), &out_dir).await
}

fn run_init(cfg: &Config, output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        return Err(anyhow!("{} already exists (use --force to overwrite)", output.display()));
    }
    generate_commented_config_template(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    ensure_dir(&cfg.data.raw_path())?;
    ensure_dir(&cfg.data.intermediate_path())?;
    println!("Wrote {}", output.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    if args.print_default_config {
        println!("{}", Config::default_toml()?);
        return Ok(());
    }

    let Some(command) = &args.command else {
        println!("Nothing to do; see `finsent --help`");
        return Ok(());
    };

    match command {
        | Command::Init { output, force } => {
            let cfg = Config::default();
            run_init(&cfg, output, *force)?;
        }
        | Command::Features(fa) => {
            let cfg = load_config(args.config.as_deref())?;
            run_features(&cfg, fa).await?;
        }
        | Command::Evaluate(ea) => {
            let cfg = load_config(args.config.as_deref())?;
            run_evaluate(&cfg, ea).await?;
        }
        | Command::Run { features, prices } => {
            let cfg = load_config(args.config.as_deref())?;
            let (ticker, run) = run_features(&cfg, features).await?;
            let out_dir = features.out_dir.clone().unwrap_or_else(|| cfg.data.intermediate_path());
            run_evaluation(&cfg, &ticker, &run.features, prices.as_deref(), &out_dir).await?;
        }
    }
    Ok(())
}
