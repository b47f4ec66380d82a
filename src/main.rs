use blogsmith::config;
use blogsmith::output::{self, Progress};
use blogsmith::renderer::MaudRenderer;
use blogsmith::swap::SymlinkSwap;
use blogsmith::update::Orchestrator;
use blogsmith::vcs::GitCli;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup — trivial, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "blogsmith")]
#[command(about = "Publish a markdown blog incrementally")]
#[command(long_about = "\
Publish a markdown blog incrementally

A git checkout of markdown documents is the data source. Each run renders
what changed, keeps per-tag and master RSS feeds consistent, and rebuilds
the paginated indexes and homepage snippet.

Source structure:

  content/
  ├── posts/
  │   ├── article/2021-mysql.md    # Front matter + markdown body
  │   ├── review/...
  │   └── page/welcome.md          # Homepage (latest-post splice markers)
  └── media/
      └── 2021/03/mysql-logo.svg   # Byte-copied to the published tree

Incremental runs diff against the upstream head and rewrite only touched
artifacts in place. Full rebuilds (--fullregenerate) assemble the whole
site in a fresh generation directory and atomically swap a symlink, so a
failed build never affects what is published.

Run 'blogsmith gen-config' to generate a documented blog.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file
    #[arg(long, default_value = "blog.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct UpdateArgs {
    /// Do a full regeneration of the site
    #[arg(long = "fullregenerate", short = 'f')]
    full_regenerate: bool,

    /// Run silently
    #[arg(long, short = 's')]
    silent: bool,

    /// Show totals
    #[arg(long, short = 't')]
    totals: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run the markdown-to-html conversion over the site
    Update(UpdateArgs),
    /// Print a stock blog.toml with all options documented
    GenConfig,
}

fn init_logging() {
    use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
    let _ = TermLogger::init(
        log::LevelFilter::Warn,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    );
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Update(args) => run_update(&cli.config, &args),
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            ExitCode::SUCCESS
        }
    }
}

fn run_update(config_path: &PathBuf, args: &UpdateArgs) -> ExitCode {
    let config = match config::load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("bad configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let vcs = GitCli::new(config.repository.clone());
    let renderer = MaudRenderer::new(config.clone());
    let progress = Progress::new(args.silent);
    let orchestrator = Orchestrator::new(&config, &vcs, &renderer, None, progress);

    let result = if args.full_regenerate {
        orchestrator.full_run(Box::new(SymlinkSwap))
    } else {
        orchestrator.incremental_run()
    };

    match result {
        Ok(report) => {
            for line in output::format_failures(&report) {
                eprintln!("{line}");
            }
            if report.success() {
                if args.totals {
                    println!("{}", output::format_totals(&report));
                }
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("update failed: {e}");
            ExitCode::FAILURE
        }
    }
}
