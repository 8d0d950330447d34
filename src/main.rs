use clap::Parser;
use std::error::Error as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use tbdb::config::default_config_path;
use tbdb::core::db::{self, DbType};
use tbdb::core::{Result, TbdbError};
use tracing::{error, info};

/// Run one query through the database facade and print the result as JSON.
#[derive(Parser, Debug, PartialEq)]
#[command(name = "tbdb", version, about)]
struct Args {
    /// TOML file with a [database] table (defaults to the user config file)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Convert the first value of the first row to this type
    /// (string, number, float, serialized, json, bool)
    #[arg(long, value_name = "TYPE", value_parser = parse_db_type)]
    var: Option<DbType>,

    /// SQL to execute
    query: String,
}

fn parse_db_type(name: &str) -> std::result::Result<DbType, String> {
    DbType::from_str(name).map_err(|e| e.to_string())
}

fn run(args: Args) -> Result<()> {
    let config_path = args
        .config
        .or_else(|| default_config_path().filter(|path| path.exists()));
    if let Some(path) = config_path {
        db::init_from_file(path)?;
    }

    let instance = db::get_instance()?;
    {
        let database = instance
            .lock()
            .map_err(|_| TbdbError::State("Failed to acquire instance lock".to_string()))?;

        match args.var {
            Some(db_type) => {
                let value = database.get_var(args.query.as_str(), None, db_type)?;
                let json = value.map(|scalar| scalar.to_json()).unwrap_or_default();
                println!("{}", json);
            }
            None => {
                let rows = database.get_results(args.query.as_str(), None)?;
                info!(rows = rows.len(), "query finished");
                for row in rows {
                    let line = serde_json::to_string(&row)
                        .map_err(|e| TbdbError::Argument(format!("cannot render row: {}", e)))?;
                    println!("{}", line);
                }
            }
        }
    }
    db::close()
}

fn main() -> ExitCode {
    // Initialize the logging system using tracing subscriber
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "tbdb failed");
            eprintln!("tbdb: {}", e);
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {}", cause);
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
