use std::error::Error;
use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, error::ErrorKind};

use crate::config::{DataRoots, IndexerConfig, PolicyConfig};
use crate::constants::splits::{DEFAULT_ELECTRODE_COUNT, DEFAULT_REPEAT_SCALE};
use crate::indexer::Indexer;
use crate::manifest::{ManifestSummary, read_manifest};
use crate::splits::RepeatScale;
use crate::types::{Electrode, SubjectId};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    Uniform,
    Oversample,
}

#[derive(Debug, Parser)]
#[command(
    name = "build_index",
    disable_help_subcommand = true,
    about = "Build or inspect per-electrode index manifests",
    long_about = "Build hour-aligned train/validation/test index manifests for one subject, or summarize existing manifests.",
    after_help = "A --config JSON file supplies defaults; explicit flags override it. Set RUST_LOG=debug for per-file logging."
)]
struct BuildIndexCli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build (or reuse) manifests for the configured set.
    Build(BuildArgs),
    /// Print row and label counts of existing manifests.
    Inspect(InspectArgs),
}

#[derive(Debug, Args)]
struct BuildArgs {
    #[arg(long, value_name = "PATH", help = "IndexerConfig JSON file")]
    config: Option<PathBuf>,
    #[arg(
        long = "train-root",
        value_name = "PATH",
        help = "Labelled recordings directory; the test root defaults to this path with 'train' replaced by 'test'"
    )]
    train_root: Option<PathBuf>,
    #[arg(long = "test-root", value_name = "PATH", help = "Held-out recordings directory")]
    test_root: Option<PathBuf>,
    #[arg(
        long = "old-test-root",
        value_name = "PATH",
        help = "Previously held-out recordings appended to training manifests when safe and positive"
    )]
    old_test_root: Option<PathBuf>,
    #[arg(long, help = "Subject number")]
    subject: Option<SubjectId>,
    #[arg(
        long = "electrode",
        value_name = "INDEX",
        help = "Electrode to index, repeat as needed (default: all)"
    )]
    electrodes: Vec<Electrode>,
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true",
        value_name = "BOOL",
        help = "Build the training side of the split"
    )]
    training: Option<bool>,
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true",
        value_name = "BOOL",
        help = "Hold back validation data"
    )]
    validate: Option<bool>,
    #[arg(long, value_enum, help = "Split policy")]
    policy: Option<PolicyArg>,
    #[arg(long = "train-percent", help = "Share assigned to training in validation mode")]
    train_percent: Option<u32>,
    #[arg(long, help = "Deterministic seed for the hour shuffle")]
    seed: Option<u64>,
    #[arg(
        long = "repeat-scale",
        help = "Oversampling scale; the most recent training hour repeats scale + 1 times"
    )]
    repeat_scale: Option<f64>,
}

#[derive(Debug, Args)]
struct InspectArgs {
    #[arg(value_name = "MANIFEST", required = true)]
    manifests: Vec<PathBuf>,
}

/// Run the `build_index` CLI with the given arguments (excluding the program name).
pub fn run_build_index<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let Some(cli) =
        parse_cli::<BuildIndexCli, _>(std::iter::once("build_index".to_string()).chain(args_iter))?
    else {
        return Ok(());
    };

    match cli.command {
        Command::Build(args) => run_build(args),
        Command::Inspect(args) => run_inspect(args),
    }
}

fn run_build(args: BuildArgs) -> Result<(), Box<dyn Error>> {
    let electrodes = if args.electrodes.is_empty() {
        (0..DEFAULT_ELECTRODE_COUNT).collect()
    } else {
        args.electrodes.clone()
    };
    let config = resolve_config(args)?;
    let indexer = Indexer::new(config)?;
    let set = indexer.set_name();
    let subject = indexer.config().subject;
    for (electrode, path) in electrodes.iter().zip(indexer.build_all(&electrodes)?) {
        println!("{set}\tsubject {subject}\telectrode {electrode}\t{}", path.display());
    }
    Ok(())
}

fn resolve_config(args: BuildArgs) -> Result<IndexerConfig, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => IndexerConfig::from_json_file(path)?,
        None => IndexerConfig::default(),
    };

    if let Some(train_root) = args.train_root {
        if args.test_root.is_none() {
            config.roots = DataRoots {
                old_test_root: config.roots.old_test_root.take(),
                ..DataRoots::from_train_root(train_root)
            };
        } else {
            config.roots.train_root = train_root;
        }
    }
    if let Some(test_root) = args.test_root {
        config.roots.test_root = test_root;
    }
    if let Some(old_test_root) = args.old_test_root {
        config.roots.old_test_root = Some(old_test_root);
    }
    if config.roots.train_root.as_os_str().is_empty() {
        return Err("no train root configured: pass --train-root or a --config file".into());
    }

    if let Some(subject) = args.subject {
        config.subject = subject;
    }
    if let Some(training) = args.training {
        config.training = training;
    }
    if let Some(validate) = args.validate {
        config.validate_mode = validate;
    }
    if let Some(train_percent) = args.train_percent {
        config.train_percent = train_percent;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    match (args.policy, args.repeat_scale) {
        (Some(PolicyArg::Uniform), _) => config.policy = PolicyConfig::UniformHour,
        (Some(PolicyArg::Oversample), scale) => {
            config.policy = PolicyConfig::ClassBalancedOversample {
                repeat_scale: RepeatScale::Uniform(scale.unwrap_or(DEFAULT_REPEAT_SCALE)),
            }
        }
        (None, Some(scale)) => match &mut config.policy {
            PolicyConfig::ClassBalancedOversample { repeat_scale } => {
                *repeat_scale = RepeatScale::Uniform(scale);
            }
            PolicyConfig::UniformHour => {
                return Err("--repeat-scale requires the oversample policy".into());
            }
        },
        (None, None) => {}
    }
    Ok(config)
}

fn run_inspect(args: InspectArgs) -> Result<(), Box<dyn Error>> {
    for path in &args.manifests {
        let rows = read_manifest(path)?;
        let summary = ManifestSummary::of(&rows);
        println!("=== {} ===", path.display());
        println!("rows: {}", summary.rows);
        println!("distinct files: {}", summary.distinct_files);
        println!("positive rows: {}", summary.positives);
        println!("negative rows: {}", summary.negatives);
    }
    Ok(())
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn build_args(extra: &[&str]) -> BuildArgs {
        let argv = ["build_index", "build"].iter().chain(extra.iter());
        match BuildIndexCli::try_parse_from(argv).unwrap().command {
            Command::Build(args) => args,
            Command::Inspect(_) => panic!("expected build subcommand"),
        }
    }

    #[test]
    fn train_root_derives_test_root() {
        let config = resolve_config(build_args(&["--train-root", "/d/train_3"])).unwrap();
        assert_eq!(config.roots.train_root, PathBuf::from("/d/train_3"));
        assert_eq!(config.roots.test_root, PathBuf::from("/d/test_3"));
    }

    #[test]
    fn bare_and_explicit_bool_flags_parse() {
        let config = resolve_config(build_args(&[
            "--train-root",
            "/d/train_1",
            "--training",
            "--validate",
            "false",
        ]))
        .unwrap();
        assert!(config.training);
        assert!(!config.validate_mode);
    }

    #[test]
    fn oversample_flags_build_policy() {
        let config = resolve_config(build_args(&[
            "--train-root",
            "/d/train_1",
            "--policy",
            "oversample",
            "--repeat-scale",
            "2.5",
            "--electrode",
            "3",
            "--electrode",
            "4",
        ]))
        .unwrap();
        assert_eq!(
            config.policy,
            PolicyConfig::ClassBalancedOversample {
                repeat_scale: RepeatScale::Uniform(2.5)
            }
        );
    }

    #[test]
    fn repeat_scale_without_oversample_is_rejected() {
        let err = resolve_config(build_args(&["--train-root", "/d/train_1", "--repeat-scale", "2"]))
            .unwrap_err();
        assert!(err.to_string().contains("oversample"));
    }

    #[test]
    fn missing_train_root_is_rejected() {
        assert!(resolve_config(build_args(&[])).is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("indexer.json");
        fs::write(
            &path,
            r#"{ "roots": { "train_root": "/d/train_2", "test_root": "/elsewhere/test_2" }, "subject": 2, "seed": 9 }"#,
        )
        .unwrap();
        let config = resolve_config(build_args(&[
            "--config",
            path.to_str().unwrap(),
            "--seed",
            "4",
        ]))
        .unwrap();
        assert_eq!(config.subject, 2);
        assert_eq!(config.seed, 4);
        assert_eq!(config.roots.test_root, PathBuf::from("/elsewhere/test_2"));
    }

    #[test]
    fn help_is_not_an_error() {
        assert!(run_build_index(["--help".to_string()].into_iter()).is_ok());
    }
}
