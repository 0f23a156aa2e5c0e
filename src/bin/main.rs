use std::error::Error;

use clap::Parser;
use partner_center::commands::connect::ConnectCommand;
use partner_center::commands::decode_credential::decode_credential;
use partner_center::factory::ConnectionFactory;
use partner_center::http::client::HttpClient;
use partner_center::parameters::{Commands, OutputFormat};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "partner-center-cli")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level written to stderr
    #[arg(long, global = true, default_value_t = Level::WARN)]
    log_level: Level,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(cli.log_level)
        .init();

    match cli.command {
        Commands::Connect {
            provider_args,
            output_format,
            http_args,
        } => {
            let config = provider_args.to_config()?;
            let http_client = HttpClient::new(http_args.to_http_config()?)
                .map_err(|e| format!("error creating http client: {e}"))?;
            let factory = ConnectionFactory::partner_center(config, http_client);
            let data = ConnectCommand::new(factory).connect()?;
            match output_format {
                OutputFormat::Plain => {
                    println!("{}", data.access_token.unwrap_or_default());
                }
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&data)?);
                }
            }
            Ok(())
        }
        Commands::DecodeCredential { token } => {
            let claims = decode_credential(&token)?;
            println!("{}", serde_json::to_string_pretty(&claims)?);
            Ok(())
        }
    }
}
