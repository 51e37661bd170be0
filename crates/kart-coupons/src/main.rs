//! couponreader - coupon ingestion and validity tool

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kart_common::logging::{init_logging, LogConfig, LogLevel};
use kart_coupons::config::Config;
use kart_coupons::pipeline::{FileOutcome, RunSummary};
use kart_coupons::{db, CouponLoader, CouponStore, CouponValidator, MemoryCouponStore, PgCouponStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "couponreader")]
#[command(author, version, about = "Coupon ingestion and validity tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the coupon source files into the store
    Load {
        /// Directory holding the source files
        #[arg(short, long, env = "COUPON_DATA_DIR")]
        data_dir: Option<PathBuf>,

        /// Comma-separated file names, each ending in its source tag
        #[arg(short, long, value_delimiter = ',')]
        files: Option<Vec<String>>,

        /// Records per bulk insert
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Concurrent bulk inserts
        #[arg(short, long)]
        workers: Option<usize>,

        /// Load into an in-memory store instead of Postgres
        #[arg(long)]
        dry_run: bool,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check whether a coupon code is valid
    Check {
        /// Coupon code, checked exactly as given
        code: String,

        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("couponreader")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    // validated once CLI overrides are applied
    let config = Config::from_env().context("Failed to read configuration")?;

    match cli.command {
        Command::Load {
            data_dir,
            files,
            batch_size,
            workers,
            dry_run,
            json,
        } => {
            let overrides = LoadOverrides {
                data_dir,
                files,
                batch_size,
                workers,
            };
            let config = overrides.apply(config)?;

            let summary = if dry_run {
                info!("Dry run: loading into an in-memory store");
                let store = Arc::new(MemoryCouponStore::new());
                let summary = CouponLoader::new(store.clone(), config.loader).run().await;
                info!(
                    rows = store.total_rows().await,
                    distinct = store.distinct_keys().await,
                    "In-memory store contents"
                );
                summary
            } else {
                let pool = db::create_pool(&config.database).await?;
                let store = Arc::new(PgCouponStore::new(pool.clone()));
                let summary = CouponLoader::new(store, config.loader).run().await;
                pool.close().await;
                summary
            };

            report(&summary, json)?;
        },
        Command::Check { code, json } => {
            config.validate()?;
            let pool = db::create_pool(&config.database).await?;
            let store: Arc<dyn CouponStore> = Arc::new(PgCouponStore::new(pool.clone()));
            let verdict = CouponValidator::new(store, &config.validity)?
                .verdict(&code)
                .await;
            pool.close().await;

            if json {
                println!("{}", serde_json::to_string_pretty(&verdict)?);
            } else {
                println!(
                    "{}: {} (found under tags {:?}, need {})",
                    verdict.code,
                    if verdict.valid { "valid" } else { "invalid" },
                    verdict.matched_tags,
                    verdict.required
                );
            }
        },
        Command::Migrate => {
            config.validate()?;
            let pool = db::create_pool(&config.database).await?;
            db::run_migrations(&pool).await?;
            pool.close().await;
            info!("Migrations applied");
        },
    }

    Ok(())
}

/// `load` flags that take precedence over the environment
#[derive(Debug, Default)]
struct LoadOverrides {
    data_dir: Option<PathBuf>,
    files: Option<Vec<String>>,
    batch_size: Option<usize>,
    workers: Option<usize>,
}

impl LoadOverrides {
    /// Overlay the flags, then validate the combined configuration
    fn apply(self, mut config: Config) -> Result<Config> {
        if let Some(data_dir) = self.data_dir {
            config.loader.data_dir = data_dir;
        }
        if let Some(files) = self.files {
            config.loader.files = files;
        }
        if let Some(batch_size) = self.batch_size {
            config.loader.batch_size = batch_size;
        }
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        config.validate()?;
        Ok(config)
    }
}

fn report(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    for outcome in &summary.files {
        match outcome {
            FileOutcome::Loaded(file) => {
                println!(
                    "{} (tag {}): {} records, {} batches ({} failed), {} rows in {:.2}s ({:.0} rows/s)",
                    file.file,
                    file.writes.file_tag,
                    file.records,
                    file.writes.batches_dispatched,
                    file.writes.batches_failed,
                    file.writes.rows_attempted,
                    file.writes.elapsed_secs,
                    file.writes.rows_per_sec,
                );
                if let Some(warning) = &file.scan_warning {
                    println!("  stopped early: {}", warning);
                }
            },
            FileOutcome::Skipped { file, reason } => {
                println!("{}: skipped ({})", file, reason);
            },
        }
    }

    println!(
        "Total: {} rows attempted, {} confirmed, {} failed batches, {:.2}s",
        summary.rows_attempted(),
        summary.rows_confirmed(),
        summary.batches_failed(),
        summary.elapsed_secs
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_repairs_invalid_env_value() {
        let mut config = Config::default();
        config.loader.max_workers = 0;

        let overrides = LoadOverrides {
            workers: Some(4),
            ..LoadOverrides::default()
        };
        let config = overrides.apply(config).unwrap();

        assert_eq!(config.loader.max_workers, 4);
        assert_eq!(config.database.max_connections, 6);
    }

    #[test]
    fn test_invalid_value_without_flag_is_rejected() {
        let mut config = Config::default();
        config.loader.max_workers = 0;

        assert!(LoadOverrides::default().apply(config).is_err());
    }

    #[test]
    fn test_flags_replace_loader_settings() {
        let overrides = LoadOverrides {
            data_dir: Some(PathBuf::from("/srv/coupons")),
            files: Some(vec!["extra4".to_string()]),
            batch_size: Some(250),
            workers: None,
        };
        let config = overrides.apply(Config::default()).unwrap();

        assert_eq!(config.loader.data_dir, PathBuf::from("/srv/coupons"));
        assert_eq!(config.loader.files, vec!["extra4"]);
        assert_eq!(config.loader.batch_size, 250);
        assert_eq!(config.loader.max_workers, 12);
    }

    #[test]
    fn test_cli_parses_load_flags() {
        let cli = Cli::try_parse_from([
            "couponreader",
            "load",
            "--files",
            "couponbase1,couponbase3",
            "--workers",
            "4",
            "--dry-run",
        ])
        .unwrap();

        match cli.command {
            Command::Load {
                files,
                workers,
                dry_run,
                ..
            } => {
                assert_eq!(files.unwrap(), vec!["couponbase1", "couponbase3"]);
                assert_eq!(workers, Some(4));
                assert!(dry_run);
            },
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
