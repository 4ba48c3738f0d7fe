//! userdata-watch binary
//!
//! Mounts a user data directory through `userdata-fs` and logs a line for
//! every change event on the watched resources.
//!
//! ## Usage
//!
//! ```bash
//! # Watch the whole home directory
//! userdata-watch --home ~/.config/app/User
//!
//! # Watch specific resources, with snippets/ as a container
//! userdata-watch --home ~/.config/app/User --container snippets settings.json snippets
//!
//! # Load home and containers from a config file
//! userdata-watch --config userdata.toml backups
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use userdata_fs::resource::FILE_SCHEME;
use userdata_fs::{LocalProvider, Resource, UserDataConfig, UserDataFileSystem, Watch};

#[derive(Debug, Parser)]
#[command(name = "userdata-watch", version, about = "Log user data change events")]
struct Args {
    /// TOML config file (home, containers, capacities).
    #[arg(long, short, conflicts_with = "home")]
    config: Option<PathBuf>,

    /// User data home directory.
    #[arg(long)]
    home: Option<PathBuf>,

    /// Relative path that behaves as a container. Repeatable.
    #[arg(long = "container", value_name = "PATH")]
    containers: Vec<String>,

    /// Resources to watch: absolute paths, `scheme://` resources, or paths
    /// relative to home. Defaults to home itself.
    targets: Vec<String>,
}

impl Args {
    fn load_config(&self) -> Result<UserDataConfig> {
        let mut config = match (&self.config, &self.home) {
            (Some(path), _) => UserDataConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            (None, Some(home)) => UserDataConfig::new(Resource::from_path(home)),
            (None, None) => bail!("either --config or --home is required"),
        };
        config.containers.extend(self.containers.iter().cloned());
        if config.home.scheme() != FILE_SCHEME {
            bail!("home must be a {FILE_SCHEME}:// resource, got {}", config.home);
        }
        Ok(config)
    }
}

fn target_resource(fs: &UserDataFileSystem, target: &str) -> Result<Resource> {
    if target.starts_with('/') || target.contains("://") {
        return target
            .parse::<Resource>()
            .with_context(|| format!("invalid resource {target}"));
    }
    Ok(fs.resolver().to_resource(target))
}

async fn log_events(mut watch: Watch) {
    while let Some(event) = watch.recv().await {
        tracing::info!(
            resource = %event.resource,
            kind = ?event.kind,
            version = event.version,
            "user data changed"
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let mut config = args.load_config()?;

    let provider = Arc::new(LocalProvider::with_capacity(
        config.home.to_path_buf(),
        config.feed_capacity,
    ));
    // Watcher events carry canonical paths; keep the namespace on the same root.
    config.home = Resource::from_path(&provider.home_dir());
    provider
        .start_watching()
        .context("starting user data watcher")?;

    let fs = Arc::new(UserDataFileSystem::from_config(&config, provider.clone()));
    let listener = fs.start_change_listener();

    let targets = if args.targets.is_empty() {
        vec![config.home.to_string()]
    } else {
        args.targets.clone()
    };

    for target in &targets {
        let resource = target_resource(&fs, target)?;
        match fs.stat(&resource).await {
            Ok(stat) => tracing::info!(
                resource = %resource,
                kind = ?stat.kind,
                size = stat.size,
                version = stat.modified,
                "watching"
            ),
            Err(e) => tracing::info!(resource = %resource, error = %e, "watching (not readable yet)"),
        }
        let watch = fs
            .watch(&resource)
            .with_context(|| format!("watching {resource}"))?;
        tokio::spawn(log_events(watch));
    }

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;

    listener.stop().await;
    provider.stop_watching();
    Ok(())
}
