use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use lkks::cli::{commands, output, Cli, Commands};

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr, off unless RUST_LOG asks for them.
    let env_filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::ERROR.into())
        .from_env_lossy();
    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_filter(env_filter);
    tracing_subscriber::registry().with(stderr_layer).init();

    let result = match cli.command {
        Commands::Init => commands::init::execute(&cli),
        Commands::AddSecret {
            ref name,
            ref algorithm,
            ref base64,
            ref file,
        } => commands::add::execute_secret(
            &cli,
            name,
            algorithm,
            base64.as_deref(),
            file.as_deref(),
        ),
        Commands::AddCert { ref name, ref file } => {
            commands::add::execute_certificate(&cli, name, file)
        }
        Commands::AddPrivate { ref name, ref file } => {
            commands::add::execute_private(&cli, name, file)
        }
        Commands::Remove {
            ref name,
            kind,
            force,
        } => commands::remove::execute(&cli, name, kind, force),
        Commands::Get {
            ref name,
            kind,
            ref output,
        } => commands::get::execute(&cli, name, kind, output.as_deref()),
        Commands::List => commands::list::execute(&cli),
        Commands::ChangePassword => commands::change_password::execute(&cli),
        Commands::Version => commands::version::execute(),
        Commands::Completions { shell } => commands::completions::execute(shell),
    };

    if let Err(e) = result {
        output::error(&e.to_string());
        std::process::exit(1);
    }
}
