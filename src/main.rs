//! `pmm` command line tool
use clap::{Args, Parser, Subcommand};
use pmm::config::EstimateConfig;
use pmm::dist::PoissonFamily;
use pmm::fit::fit;
use pmm::io::csv::read_groups;
use pmm::io::dump::write_dump;
use pmm::io::summary::write_summary;
use pmm::logging::{init_logging, LogConfig, LogFormat};
use pmm::MixtureModel;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// Grouped Poisson mixture estimation
#[derive(Parser)]
#[command(name = "pmm")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log output format (human or json)
    #[arg(long, global = true, env = "PMM_LOG_FORMAT")]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit a mixture to CSV records on stdin or to a dump and print the
    /// result
    Estimate(EstimateArgs),
    /// Convert CSV records to a binary dump
    Csv2dump(Csv2dumpArgs),
}

#[derive(Args, Debug)]
struct EstimateArgs {
    /// TOML file with run settings; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of mixture components
    #[arg(short = 'k', long = "nmix")]
    k: Option<usize>,

    /// Data dimension
    #[arg(short = 'd', long = "dim")]
    d: Option<usize>,

    /// Maximum number of iterations
    #[arg(short = 'i', long = "max-iter")]
    max_iter: Option<usize>,

    /// Run exactly the maximum number of iterations
    #[arg(short = 'c', long = "fixed-iter")]
    fixed_iter: bool,

    /// Minimum number of records per group
    #[arg(short = 't', long = "min-data")]
    min_group_size: Option<usize>,

    /// Read a binary dump instead of CSV from stdin
    #[arg(short = 'b', long = "dump-path")]
    dump_path: Option<PathBuf>,

    /// Seed for the initial parameters
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug)]
struct Csv2dumpArgs {
    /// Input CSV file; stdin if omitted
    #[arg(short = 'f', long = "input")]
    input: Option<PathBuf>,

    /// Data dimension
    dimension: usize,

    /// Output dump file
    output: PathBuf,
}

impl EstimateArgs {
    fn resolve(&self) -> pmm::Result<EstimateConfig> {
        let mut config = match &self.config {
            Some(path) => EstimateConfig::load(path)?,
            None => EstimateConfig::default(),
        };
        if let Some(k) = self.k {
            config.k = k;
        }
        if let Some(d) = self.d {
            config.d = d;
        }
        if let Some(max_iter) = self.max_iter {
            config.max_iter = max_iter;
        }
        if let Some(min_group_size) = self.min_group_size {
            config.min_group_size = min_group_size;
        }
        if self.fixed_iter {
            config.fixed_iter = true;
        }
        if self.dump_path.is_some() {
            config.dump_path.clone_from(&self.dump_path);
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config.validate()?;
        Ok(config)
    }
}

fn estimate(config: &EstimateConfig) -> pmm::Result<()> {
    info!(
        k = config.k,
        d = config.d,
        max_iter = config.max_iter,
        "estimate"
    );

    let mut rng = match config.seed {
        Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
        None => Xoshiro256PlusPlus::from_entropy(),
    };
    let mut model =
        MixtureModel::new(PoissonFamily, config.k, config.d, &mut rng)?
            .with_min_group_size(config.min_group_size);

    match &config.dump_path {
        Some(path) => {
            let mut reader = BufReader::new(File::open(path)?);
            model.load_dump(&mut reader)?;
        }
        None => {
            model.read_csv(io::stdin().lock(), true)?;
        }
    }

    if let Some(stats) = model.data_stats() {
        info!(
            n_groups = stats.n_groups,
            n_observations = stats.n_observations,
            mean = stats.mean,
            variance = stats.variance,
            min = stats.min,
            max = stats.max,
            q1 = stats.quartiles[0],
            q2 = stats.quartiles[1],
            q3 = stats.quartiles[2],
            "data stats"
        );
    }

    let report = fit(&mut model, &config.em_config())?;
    info!(
        n_iter = report.n_iter,
        termination = ?report.termination,
        elapsed_s = report.elapsed.as_secs_f64(),
        "fit complete"
    );

    let stdout = io::stdout();
    write_summary(&mut stdout.lock(), &model)?;

    let aic = model.aic_report()?;
    info!(
        aic = aic.score(),
        likelihood_term = aic.likelihood_term(),
        penalty_term = aic.penalty_term(),
        "{}",
        aic
    );
    Ok(())
}

fn csv2dump(args: &Csv2dumpArgs) -> pmm::Result<()> {
    let reader: Box<dyn Read> = match &args.input {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(io::stdin().lock()),
    };
    let (table, report) =
        read_groups(reader, &PoissonFamily, args.dimension, 1)?;
    let groups = table.into_groups();

    let mut writer = BufWriter::new(File::create(&args.output)?);
    write_dump(&mut writer, args.dimension, &groups)?;
    info!(
        n_groups = groups.len(),
        n_records = report.n_added,
        output = %args.output.display(),
        "wrote dump"
    );
    Ok(())
}

enum Job {
    Estimate(EstimateConfig),
    Csv2dump(Csv2dumpArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let job = match cli.command {
        Commands::Estimate(args) => match args.resolve() {
            Ok(config) => Job::Estimate(config),
            Err(err) => {
                eprintln!("pmm: {}", err);
                return ExitCode::FAILURE;
            }
        },
        Commands::Csv2dump(args) => Job::Csv2dump(args),
    };

    let log_format = match (&cli.log_format, &job) {
        (Some(format), _) => *format,
        (None, Job::Estimate(config)) => config.log_format,
        (None, Job::Csv2dump(_)) => LogFormat::default(),
    };
    let log_config = LogConfig::default().with_format(log_format);
    if let Err(err) = init_logging(&log_config) {
        eprintln!("pmm: {}", err);
        return ExitCode::FAILURE;
    }

    let result = match &job {
        Job::Estimate(config) => estimate(config),
        Job::Csv2dump(args) => csv2dump(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
