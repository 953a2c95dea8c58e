pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "natours")]
#[command(about = "Natours CLI - tokens, query inspection and seed checks for the Natours API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Mint a bearer token for a user id with the configured secret")]
    Token {
        #[arg(long, help = "Id of the user document the token identifies")]
        user: String,
        #[arg(long, help = "Hours until the token expires (defaults to JWT_EXPIRES_IN_HOURS)")]
        hours: Option<u64>,
    },

    #[command(about = "Show the query a list request would run")]
    Query {
        #[arg(help = "Raw query string, e.g. 'price[gte]=500&sort=-ratingsAverage'")]
        query: String,
        #[arg(long, default_value = "tours", help = "Resource the query targets")]
        resource: String,
        #[arg(long, help = "Also print the PostgreSQL statement")]
        sql: bool,
    },

    #[command(about = "Validate a seed file against the resource schemas")]
    Seed {
        #[arg(help = "Seed file (.yaml, .yml or .json)")]
        path: std::path::PathBuf,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Token { user, hours } => commands::token::handle(&user, hours, output_format),
        Commands::Query { query, resource, sql } => commands::query::handle(&query, &resource, sql, output_format),
        Commands::Seed { path } => commands::seed::handle(&path, output_format),
    }
}
