use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use import_assets::config::ImportAssetsConfig;
use import_assets::{ImportAssets, ImportAssetsOptions};

/// Rewrite static asset references in component markup into imports.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
  /// Config file path (default: import-assets.json in the working directory)
  #[arg(short = 'C', long, value_hint = clap::ValueHint::FilePath)]
  config: Option<PathBuf>,

  /// Write results into this directory instead of stdout
  #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
  out_dir: Option<PathBuf>,

  /// Also write `<name>.map` next to every output file
  #[arg(long, requires = "out_dir")]
  source_map: bool,

  /// Prefix of generated import identifiers
  #[arg(long)]
  import_prefix: Option<String>,

  /// Rewrite absolute http(s) URLs as well
  #[arg(long)]
  http: bool,

  /// Increase log verbosity (-v debug, -vv trace)
  #[arg(short, long, action = clap::ArgAction::Count)]
  verbose: u8,

  /// Component files to process
  #[arg(required = true, value_hint = clap::ValueHint::FilePath)]
  files: Vec<PathBuf>,
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  match run(&cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      eprintln!("error: {err:#}");
      ExitCode::FAILURE
    }
  }
}

fn init_tracing(verbose: u8) {
  let filter = match verbose {
    0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    1 => EnvFilter::new("import_assets=debug"),
    _ => EnvFilter::new("import_assets=trace"),
  };

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(io::stderr)
    .init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
  let cwd = env::current_dir().context("failed to resolve working directory")?;
  let assets = ImportAssets::new(load_options(cli, &cwd)?);

  if let Some(out_dir) = &cli.out_dir {
    fs::create_dir_all(out_dir)
      .with_context(|| format!("failed to create {}", out_dir.display()))?;
  }

  let stdout = io::stdout();
  for file in &cli.files {
    let mut handle = stdout.lock();
    process_file(&assets, file, cli.out_dir.as_deref(), cli.source_map, &mut handle)?;
  }

  Ok(())
}

/// Merge the config file with command line overrides.
fn load_options(cli: &Cli, cwd: &Path) -> anyhow::Result<ImportAssetsOptions> {
  let config = match &cli.config {
    Some(path) => ImportAssetsConfig::from_path(path)?,
    None => ImportAssetsConfig::discover(cwd)?,
  };

  let mut options = config.into_options()?;
  if let Some(prefix) = &cli.import_prefix {
    options = options.import_prefix(prefix.clone());
  }
  if cli.http {
    options = options.http(true);
  }

  debug!(?options, "resolved options");
  Ok(options)
}

fn process_file(
  assets: &ImportAssets,
  path: &Path,
  out_dir: Option<&Path>,
  source_map: bool,
  stdout: &mut dyn Write,
) -> anyhow::Result<()> {
  let content =
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
  let filename = path.to_string_lossy();
  let processed = assets
    .markup(&content, Some(filename.as_ref()))
    .with_context(|| format!("failed to process {}", path.display()))?;

  let Some(out_dir) = out_dir else {
    stdout.write_all(processed.code.as_bytes())?;
    return Ok(());
  };

  let Some(name) = path.file_name() else {
    bail!("{} has no file name", path.display());
  };
  let destination = out_dir.join(name);
  fs::write(&destination, &processed.code)
    .with_context(|| format!("failed to write {}", destination.display()))?;
  info!(source = %path.display(), output = %destination.display(), "wrote component");

  if source_map {
    let mut map_name = name.to_os_string();
    map_name.push(".map");
    let map_path = out_dir.join(map_name);
    let json = processed
      .map_json()
      .with_context(|| format!("failed to serialise source map for {}", path.display()))?;
    fs::write(&map_path, json)
      .with_context(|| format!("failed to write {}", map_path.display()))?;
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  fn cli(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("import-assets").chain(args.iter().copied()))
      .expect("arguments should parse")
  }

  #[test]
  fn source_map_requires_out_dir() {
    assert!(Cli::try_parse_from(["import-assets", "--source-map", "App.svelte"]).is_err());
    assert!(Cli::try_parse_from(["import-assets"]).is_err());
  }

  #[test]
  fn command_line_overrides_config_file() {
    let temp = tempdir().expect("failed to create temp dir");
    fs::write(
      temp.path().join("import-assets.json"),
      r#"{ "importPrefix": "fromFile", "http": false }"#,
    )
    .expect("failed to write config");

    let options = load_options(&cli(&["App.svelte"]), temp.path()).unwrap();
    assert_eq!(options.import_prefix, "fromFile");
    assert!(!options.http);

    let options = load_options(
      &cli(&["--import-prefix", "cli", "--http", "App.svelte"]),
      temp.path(),
    )
    .unwrap();
    assert_eq!(options.import_prefix, "cli");
    assert!(options.http);
  }

  #[test]
  fn explicit_config_must_exist() {
    let temp = tempdir().expect("failed to create temp dir");
    let missing = temp.path().join("missing.json");
    let args = cli(&["--config", missing.to_str().unwrap(), "App.svelte"]);
    assert!(load_options(&args, temp.path()).is_err());
  }

  #[test]
  fn prints_to_stdout_without_out_dir() {
    let temp = tempdir().expect("failed to create temp dir");
    let input = temp.path().join("App.svelte");
    fs::write(&input, r#"<img src="./a.png">"#).expect("failed to write input");

    let mut stdout: Vec<u8> = Vec::new();
    process_file(&ImportAssets::default(), &input, None, false, &mut stdout).unwrap();
    assert_eq!(
      String::from_utf8(stdout).unwrap(),
      r#"<img src="{___ASSET___0}"><script>import ___ASSET___0 from "./a.png";</script>"#
    );
  }

  #[test]
  fn writes_output_and_source_map() {
    let temp = tempdir().expect("failed to create temp dir");
    let input = temp.path().join("Card.svelte");
    fs::write(&input, "<script>let a;</script>\n<img src=\"./a.png\">").expect("failed to write input");
    let out_dir = temp.path().join("out");
    fs::create_dir_all(&out_dir).expect("failed to create out dir");

    let mut stdout: Vec<u8> = Vec::new();
    process_file(&ImportAssets::default(), &input, Some(out_dir.as_path()), true, &mut stdout).unwrap();

    assert!(stdout.is_empty());
    let code = fs::read_to_string(out_dir.join("Card.svelte")).unwrap();
    assert!(code.starts_with("<script>import ___ASSET___0 from \"./a.png\";let a;</script>"));

    let map = sourcemap::SourceMap::from_slice(&fs::read(out_dir.join("Card.svelte.map")).unwrap())
      .unwrap();
    assert_eq!(map.get_source_contents(0), Some(fs::read_to_string(&input).unwrap().as_str()));
  }

  #[test]
  fn reports_parse_failures_with_the_file_name() {
    let temp = tempdir().expect("failed to create temp dir");
    let input = temp.path().join("Broken.svelte");
    fs::write(&input, "<div>").expect("failed to write input");

    let err = process_file(&ImportAssets::default(), &input, None, false, &mut Vec::<u8>::new())
      .unwrap_err();
    assert!(format!("{err:#}").starts_with("failed to process"));
  }
}
