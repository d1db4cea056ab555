//! `gha-doc` binary entry point.

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ghadoc_core=info,ghadoc_cli=info".into()),
        )
        .init();

    let cli = ghadoc_cli::parse_args(std::env::args_os(), &ghadoc_cli::env_dir());
    let in_github_action = std::env::var_os("GITHUB_ACTION").is_some();
    let command = ghadoc_cli::select_command(cli.command, in_github_action);

    if let Err(e) = ghadoc_cli::dispatch(command).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
