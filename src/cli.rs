use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use ferclass::data::{load_image_folder, DataLoader, ImageDataset};
use ferclass::eval::{classification_report, evaluate, ConfusionMatrix};
use ferclass::model::{Checkpoint, ModelMetadata, ModelSpec, SmallCnnConfig};
use ferclass::train::fit;
use ferclass::{LossType, RunConfig};

#[derive(Parser, Debug)]
#[command(name = "ferclass", version, about = "Train and evaluate seven-class image classifiers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default run configuration to a JSON file
    InitConfig(InitConfigArgs),

    /// Train a model as described by a run configuration
    Train(TrainArgs),

    /// Evaluate one checkpoint, or an ensemble of several, on a labelled image folder
    Evaluate(EvaluateArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Arch {
    Resnet18,
    SmallCnn,
}

#[derive(Args, Debug)]
pub struct InitConfigArgs {
    #[arg(long, default_value = "run.json")]
    pub output: PathBuf,

    #[arg(long, value_enum, default_value_t = Arch::Resnet18)]
    pub arch: Arch,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[arg(long, default_value = "run.json")]
    pub config: PathBuf,

    /// Directory receiving the checkpoint, history and test metrics
    #[arg(long, default_value = "checkpoints")]
    pub out_dir: PathBuf,

    /// Overrides training.epochs
    #[arg(long)]
    pub epochs: Option<usize>,

    /// Overrides training.batch_size
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Overrides training.seed
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Checkpoint file; repeat to average several models
    #[arg(long = "checkpoint", required = true)]
    pub checkpoints: Vec<PathBuf>,

    /// `dir/<class>/<image>` folder to evaluate on
    #[arg(long)]
    pub data: PathBuf,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    /// Where to write the metrics JSON
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Log per-class results
    #[arg(long)]
    pub verbose: bool,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::InitConfig(args) => init_config(args),
            Commands::Train(args) => train(args),
            Commands::Evaluate(args) => evaluate_checkpoints(args),
        }
    }
}

fn init_config(args: InitConfigArgs) -> Result<()> {
    let config = match args.arch {
        Arch::Resnet18 => RunConfig::default(),
        Arch::SmallCnn => {
            let mut config = RunConfig {
                name: "small_cnn".into(),
                model: ModelSpec::SmallCnn(SmallCnnConfig::default()),
                loss: LossType::Nll,
                ..RunConfig::default()
            };
            config.data.height = 28;
            config.data.width = 28;
            config
        }
    };
    config
        .save_json(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!(path = %args.output.display(), "wrote default configuration");
    Ok(())
}

fn train(args: TrainArgs) -> Result<()> {
    let mut config = RunConfig::load_json(&args.config)
        .with_context(|| format!("reading {}", args.config.display()))?;
    if let Some(epochs) = args.epochs {
        config.training.epochs = epochs;
    }
    if let Some(batch_size) = args.batch_size {
        config.training.batch_size = batch_size;
    }
    if args.seed.is_some() {
        config.training.seed = args.seed;
    }
    config.validate()?;

    let data = &config.data;
    let full = load_image_folder(&data.train_dir, data.channels, data.height, data.width)
        .with_context(|| format!("loading training images from {}", data.train_dir.display()))?;
    let (train_set, val_set) = match &data.val_dir {
        Some(dir) => (full, load_folder(dir, &config)?),
        None => full.split(data.val_fraction, config.training.seed.unwrap_or(0))?,
    };
    check_classes(&config.model, &train_set)?;
    info!(train = train_set.len(), validation = val_set.len(), "datasets ready");

    let mut model = config.model.build()?;
    let loss_fn = config.loss.build();
    let mut optimizer = config.optimizer.build();

    let mut train_loader = seeded(
        DataLoader::new(&train_set, config.training.batch_size)?.with_shuffle(config.training.shuffle),
        config.training.seed,
    );
    let mut val_loader = DataLoader::new(&val_set, config.training.batch_size)?;

    let history = fit(
        model.as_mut(),
        &mut train_loader,
        &mut val_loader,
        loss_fn.as_ref(),
        optimizer.as_mut(),
        &config.training,
    )?;

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;
    let metadata = ModelMetadata {
        description: Some(format!("{} trained for {} epochs", config.name, history.epochs.len())),
        input: Some(data.input_shape()),
        class_names: Some(train_set.class_names().to_vec()),
        best_epoch: history.best_epoch,
    };
    let checkpoint = Checkpoint::capture(config.model.clone(), metadata, model.as_mut())?;
    let checkpoint_path = args.out_dir.join(format!("{}.json", config.name));
    checkpoint.save_json(&checkpoint_path)?;
    write_json(&args.out_dir.join(format!("{}_history.json", config.name)), &history)?;
    info!(
        path = %checkpoint_path.display(),
        tensors = checkpoint.state.len(),
        values = checkpoint.state.num_values(),
        stopped_early = history.stopped_early,
        "saved checkpoint"
    );

    if let Some(test_dir) = &data.test_dir {
        if test_dir.is_dir() {
            let test_set = load_folder(test_dir, &config)?;
            let mut loader = DataLoader::new(&test_set, config.training.batch_size)?;
            let mut models = vec![model];
            let metrics = evaluate(&mut models, &mut loader, false)?;
            println!("{}", classification_report(&metrics, test_set.class_names()));
            write_json(&args.out_dir.join(format!("{}_metrics.json", config.name)), &metrics)?;
        }
    }
    Ok(())
}

fn evaluate_checkpoints(args: EvaluateArgs) -> Result<()> {
    let mut checkpoints = Vec::with_capacity(args.checkpoints.len());
    for path in &args.checkpoints {
        checkpoints.push(Checkpoint::load_json(path).with_context(|| format!("reading {}", path.display()))?);
    }

    let Some(input) = checkpoints[0].metadata.input else {
        bail!("checkpoint {} does not record its input shape", args.checkpoints[0].display());
    };
    if let Some((path, _)) = args
        .checkpoints
        .iter()
        .zip(checkpoints.iter())
        .find(|(_, c)| c.metadata.input.is_some_and(|i| i != input))
    {
        bail!("checkpoint {} was trained on a different input shape", path.display());
    }

    let mut models = Vec::with_capacity(checkpoints.len());
    for checkpoint in &checkpoints {
        models.push(checkpoint.into_model()?);
    }

    let dataset = load_image_folder(&args.data, input.channels, input.height, input.width)
        .with_context(|| format!("loading images from {}", args.data.display()))?;
    check_classes(&checkpoints[0].spec, &dataset)?;
    let mut loader = DataLoader::new(&dataset, args.batch_size)?;
    let metrics = evaluate(&mut models, &mut loader, args.verbose)?;

    let names = checkpoints[0]
        .metadata
        .class_names
        .clone()
        .unwrap_or_else(|| dataset.class_names().to_vec());
    let matrix = ConfusionMatrix::from_labels(&metrics.correct_labels, &metrics.predicted_labels, metrics.num_classes())?
        .with_class_names(&names);
    println!("{}", classification_report(&metrics, &names));
    println!("{matrix}");

    if let Some(output) = &args.output {
        write_json(output, &metrics)?;
        info!(path = %output.display(), "wrote metrics");
    }
    Ok(())
}

fn load_folder(dir: &Path, config: &RunConfig) -> Result<ImageDataset> {
    let data = &config.data;
    load_image_folder(dir, data.channels, data.height, data.width)
        .with_context(|| format!("loading images from {}", dir.display()))
}

fn check_classes(spec: &ModelSpec, dataset: &ImageDataset) -> Result<()> {
    if dataset.num_classes() != spec.num_classes() {
        bail!(
            "model predicts {} classes but the dataset has {} class folders",
            spec.num_classes(),
            dataset.num_classes()
        );
    }
    Ok(())
}

fn seeded(loader: DataLoader<'_>, seed: Option<u64>) -> DataLoader<'_> {
    match seed {
        Some(seed) => loader.with_seed(seed),
        None => loader,
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)?;
    Ok(())
}
