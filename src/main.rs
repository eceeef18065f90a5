use clap::Parser;
use notme::cli::{Cli, Commands};
use notme::config::Settings;

fn main() {
    let cli = Cli::parse();

    // Settings decide the default log level, so load them before tracing.
    let settings = match notme::cli::data_dir(&cli).and_then(|dir| Settings::load(&dir)) {
        Ok(settings) => settings,
        Err(e) => {
            notme::cli::output::error(&e.to_string());
            std::process::exit(1);
        }
    };
    init_tracing(&settings.log_level);

    let result = match cli.command {
        Commands::Init => notme::cli::commands::init::execute(&cli),
        Commands::Status => notme::cli::commands::status::execute(&cli),
        Commands::Add {
            ref package,
            ref title,
            ref text,
            ref category,
            ongoing,
            actions,
            ref timestamp,
        } => notme::cli::commands::add::execute(
            &cli,
            notme::cli::commands::add::AddArgs {
                package,
                title: title.as_deref(),
                text: text.as_deref(),
                category: category.as_deref(),
                ongoing,
                actions,
                timestamp: timestamp.as_deref(),
            },
        ),
        Commands::List { limit, json } => notme::cli::commands::list::execute(&cli, limit, json),
        Commands::Search {
            ref query,
            ref package,
            ref category,
            ref sort,
            limit,
        } => notme::cli::commands::search::execute(
            &cli,
            query,
            package.as_deref(),
            category.as_deref(),
            sort,
            limit,
        ),
        Commands::Stats { ref by } => notme::cli::commands::stats::execute(&cli, by.as_deref()),
        Commands::Clear { force } => notme::cli::commands::clear::execute(&cli, force),
        Commands::Compact => notme::cli::commands::compact::execute(&cli),
        Commands::Completions { shell } => notme::cli::commands::completions::execute(shell),
    };

    if let Err(e) = result {
        notme::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}

/// Log to stderr, filtered by `NOTME_LOG` or the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("NOTME_LOG")
        .unwrap_or_else(|_| EnvFilter::new(format!("notme={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
