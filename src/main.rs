use prism::config::{Cli, Config};

#[tokio::main]
async fn main() {
    let cli = Cli::from_env();
    let config = match Config::load(&cli.config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load config from {}: {}", cli.config_path, err);
            std::process::exit(1);
        }
    };
    prism::run(config).await;
}
