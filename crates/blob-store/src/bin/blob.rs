use std::{
    io::{self, Read, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{anyhow, bail, Context, Result};
use blob_store::{config::base_dir, ObjectStoreConfig, ObjectStoreProvider};
use clap::{Parser, Subcommand};
use serde_json::{Number, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Object store upload/download CLI", long_about = None)]
struct Args {
    #[arg(
        short,
        long,
        value_name = "PATH",
        help = "Path to object store config file (TOML or JSON)"
    )]
    config: Option<PathBuf>,

    #[arg(
        long = "override",
        value_name = "KEY=VALUE",
        help = "Override configuration value using dot-separated paths"
    )]
    overrides: Vec<OverrideArg>,

    #[arg(short, long, help = "Log at debug level")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a file from disk.
    Upload {
        file: PathBuf,
        object_name: String,
        #[arg(long, help = "Skip re-hashing the stored object")]
        no_verify: bool,
    },
    /// Upload everything read from stdin.
    UploadStream { object_name: String },
    /// Download an object to a file or directory.
    Download {
        object_name: String,
        destination: PathBuf,
        #[arg(long)]
        overwrite: bool,
        #[arg(long, help = "Keep the partial file when verification fails")]
        keep_partial: bool,
    },
    /// Write an object to stdout.
    Cat {
        object_name: String,
        #[arg(long, value_name = "BYTES")]
        chunk_size: Option<usize>,
    },
}

#[derive(Debug, Clone)]
struct OverrideArg {
    path: String,
    value: String,
}

impl FromStr for OverrideArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (path, value) = s
            .split_once('=')
            .ok_or_else(|| "override must be in the form key=value".to_string())?;
        if path.trim().is_empty() {
            return Err("override key must not be empty".into());
        }
        Ok(Self {
            path: path.trim().to_string(),
            value: value.trim().to_string(),
        })
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let mut config = load_config(args.config.as_deref(), &args.overrides)?;
    config.apply_env();
    config.validate()?;

    let store = config.initialize_object()?;
    run(&store, args.command)
}

/// Reads the config file (if any) and applies overrides. A relative `local`
/// root from either source resolves against the config file's directory, or
/// the working directory when there is no file.
fn load_config(path: Option<&Path>, overrides: &[OverrideArg]) -> Result<ObjectStoreConfig> {
    let (mut config, base) = match path {
        Some(path) => (
            ObjectStoreConfig::from_path(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            base_dir(path),
        ),
        None => (
            ObjectStoreConfig::new("", ""),
            std::env::current_dir().context("failed to read working directory")?,
        ),
    };
    if !overrides.is_empty() {
        config = apply_overrides(config, overrides)?;
    }
    config.resolve_paths(&base);
    Ok(config)
}

fn run(store: &ObjectStoreProvider, command: Command) -> Result<()> {
    match command {
        Command::Upload {
            file,
            object_name,
            no_verify,
        } => {
            let meta = store.upload_object(&file, &object_name, !no_verify, None, None)?;
            info!(object = %meta.name, size = meta.size, "uploaded");
        }
        Command::UploadStream { object_name } => {
            let mut data = Vec::new();
            io::stdin()
                .lock()
                .read_to_end(&mut data)
                .context("failed to read stdin")?;
            let meta = store.upload_object_via_stream(data, &object_name, None, None)?;
            info!(object = %meta.name, size = meta.size, "uploaded");
        }
        Command::Download {
            object_name,
            destination,
            overwrite,
            keep_partial,
        } => {
            store.download_object(&object_name, &destination, overwrite, !keep_partial)?;
            info!(object = %object_name, destination = %destination.display(), "downloaded");
        }
        Command::Cat {
            object_name,
            chunk_size,
        } => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            for chunk in store.download_object_as_stream(&object_name, chunk_size)? {
                out.write_all(&chunk?)?;
            }
            out.flush()?;
        }
    }
    Ok(())
}

fn apply_overrides(config: ObjectStoreConfig, overrides: &[OverrideArg]) -> Result<ObjectStoreConfig> {
    let mut value =
        serde_json::to_value(config).context("failed to serialize config for overrides")?;

    for override_arg in overrides {
        set_value_at_path(&mut value, &override_arg.path, &override_arg.value)?;
    }

    serde_json::from_value(value).context("failed to deserialize config after overrides")
}

/// Every field is a string except `port`; `null` clears an optional field.
fn parse_override_value(key: &str, raw: &str, nested: bool) -> Result<Value> {
    if !nested && raw.eq_ignore_ascii_case("null") {
        return Ok(Value::Null);
    }
    if !nested && key == "port" {
        let port: u16 = raw
            .parse()
            .map_err(|err| anyhow!("invalid port '{}': {}", raw, err))?;
        return Ok(Value::Number(Number::from(port)));
    }
    Ok(Value::String(raw.to_string()))
}

fn set_value_at_path(value: &mut Value, path: &str, raw: &str) -> Result<()> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        bail!("invalid override path '{}'", path);
    }

    let root = value
        .as_object_mut()
        .ok_or_else(|| anyhow!("override root must be a JSON object"))?;
    match segments.as_slice() {
        [key] => {
            if !root.contains_key(*key) {
                bail!("unknown config field '{}'", key);
            }
            root.insert(key.to_string(), parse_override_value(key, raw, false)?);
        }
        [map, key] => {
            let entry = root
                .get_mut(*map)
                .and_then(Value::as_object_mut)
                .ok_or_else(|| anyhow!("override path segment '{}' is not a map", map))?;
            entry.insert(key.to_string(), parse_override_value(key, raw, true)?);
        }
        _ => bail!("override path '{}' is nested too deeply", path),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arg(s: &str) -> OverrideArg {
        s.parse().unwrap()
    }

    #[test]
    fn overrides_fill_fields_and_extras() {
        let config = ObjectStoreConfig::new("local", "bucket");
        let config = apply_overrides(
            config,
            &[
                arg("container=other"),
                arg("port=9000"),
                arg("extra_init_kwargs.create_containers=true"),
            ],
        )
        .unwrap();
        assert_eq!(config.container, "other");
        assert_eq!(config.port, Some(9000));
        assert_eq!(
            config.extra_init_kwargs.get("create_containers").map(String::as_str),
            Some("true")
        );
    }

    #[test]
    fn overridden_local_root_resolves_like_the_file_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.toml");
        std::fs::write(&path, "provider = \"local\"\ncontainer = \"c\"\nkey = \"data\"\n")
            .unwrap();

        let from_file = load_config(Some(&path), &[]).unwrap();
        let overridden = load_config(Some(&path), &[arg("key=data")]).unwrap();
        assert_eq!(from_file.key, overridden.key);
        assert_eq!(
            overridden.key.as_deref().map(Path::new),
            Some(base_dir(&path).join("data").as_path())
        );
    }

    #[test]
    fn rejects_unknown_and_malformed_overrides() {
        let config = ObjectStoreConfig::new("local", "bucket");
        assert!(apply_overrides(config.clone(), &[arg("bogus=1")]).is_err());
        assert!(apply_overrides(config.clone(), &[arg("port=abc")]).is_err());
        assert!(apply_overrides(config, &[arg("a.b.c=1")]).is_err());
        assert!("novalue".parse::<OverrideArg>().is_err());
    }
}
