//! wastenet CLI: train, evaluate, and inspect the waste-photo classifier.

use std::path::{Path, PathBuf};

use anyhow::Result;
use burn::module::AutodiffModule;
use burn::module::Module;
use burn::record::CompactRecorder;
use burn::tensor::backend::Backend;
use chrono::Local;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use wastenet::backend::{backend_name, default_device, DefaultBackend, TrainingBackend};
use wastenet::dataset::{stratified_holdout, WasteFolderDataset, WasteTensorDataset};
use wastenet::eval::Evaluator;
use wastenet::model::{ModelConfig, WasteNet};
use wastenet::training::{LrFinderConfig, OrchestratorConfig, TrainingOrchestrator};
use wastenet::utils::logging::{init_logging, LogConfig};

/// Waste-photo classification with a residual CNN and a staged training
/// schedule.
#[derive(Parser, Debug)]
#[command(name = "wastenet")]
#[command(version)]
#[command(about = "Train and evaluate a residual waste-photo classifier", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train on `<data-root>/train`, monitoring a held-out validation slice
    Train {
        /// Dataset root containing train/ and test/ folder trees
        #[arg(short, long, default_value = "data")]
        data_root: String,

        /// Batch size
        #[arg(short, long, default_value = "64")]
        batch_size: usize,

        /// Disable train-time augmentation
        #[arg(long, default_value = "false")]
        no_augmentation: bool,

        /// Skip exporting classifier report and prediction CSVs
        #[arg(long, default_value = "false")]
        no_export: bool,

        /// Image edge length (multiple of 32)
        #[arg(long, default_value = "224")]
        image_size: usize,

        /// Epochs for the constant, cyclical, and convergence stages
        #[arg(long, num_args = 3, default_values = ["24", "24", "12"])]
        stage_epochs: Vec<usize>,

        /// Early-stopping patience (epochs without improvement)
        #[arg(long, default_value = "4")]
        patience: usize,

        /// Minimum macro-F1 gain that counts as improvement
        #[arg(long, default_value = "0.001")]
        min_delta: f64,

        /// Fraction of the training folder held out for validation
        #[arg(long, default_value = "0.2")]
        valid_fraction: f64,

        /// Random seed
        #[arg(long, default_value = "18264")]
        seed: u64,

        /// Directory for checkpoints and result CSVs
        #[arg(short, long, default_value = "output")]
        output_dir: String,
    },

    /// Evaluate a saved checkpoint on `<data-root>/test`
    Evaluate {
        /// Dataset root containing the test/ folder tree
        #[arg(short, long, default_value = "data")]
        data_root: String,

        /// Checkpoint file stem (as reported by training)
        #[arg(short, long)]
        model: String,

        /// Batch size
        #[arg(short, long, default_value = "64")]
        batch_size: usize,

        /// Image edge length the checkpoint was trained at
        #[arg(long, default_value = "224")]
        image_size: usize,

        /// Skip the test-time-augmented pass
        #[arg(long, default_value = "false")]
        no_tta: bool,

        /// Skip exporting report and prediction CSVs
        #[arg(long, default_value = "false")]
        no_export: bool,

        /// Directory for result CSVs
        #[arg(short, long, default_value = "output")]
        output_dir: String,
    },

    /// Show dataset statistics
    Stats {
        /// Dataset root containing train/ and test/ folder trees
        #[arg(short, long, default_value = "data")]
        data_root: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    let _ = init_logging(&log_config);

    match cli.command {
        Commands::Train {
            data_root,
            batch_size,
            no_augmentation,
            no_export,
            image_size,
            stage_epochs,
            patience,
            min_delta,
            valid_fraction,
            seed,
            output_dir,
        } => cmd_train(TrainArgs {
            data_root,
            batch_size,
            augmentation: !no_augmentation,
            export_results: !no_export,
            image_size,
            stage_epochs,
            patience,
            min_delta,
            valid_fraction,
            seed,
            output_dir,
        }),

        Commands::Evaluate {
            data_root,
            model,
            batch_size,
            image_size,
            no_tta,
            no_export,
            output_dir,
        } => cmd_evaluate(
            &data_root,
            &model,
            batch_size,
            image_size,
            !no_tta,
            !no_export,
            &output_dir,
        ),

        Commands::Stats { data_root } => cmd_stats(&data_root),
    }
}

struct TrainArgs {
    data_root: String,
    batch_size: usize,
    augmentation: bool,
    export_results: bool,
    image_size: usize,
    stage_epochs: Vec<usize>,
    patience: usize,
    min_delta: f64,
    valid_fraction: f64,
    seed: u64,
    output_dir: String,
}

fn cmd_train(args: TrainArgs) -> Result<()> {
    println!("{}", "wastenet training".green().bold());
    println!("  backend: {}", backend_name());

    let device = default_device();
    TrainingBackend::seed(&device, args.seed);

    // Discover and split the training folder.
    let train_dir = Path::new(&args.data_root).join("train");
    let folder = WasteFolderDataset::new(&train_dir)?;
    folder.stats().print();

    let class_names = folder.idx_to_class.clone();
    let num_classes = folder.num_classes();

    let (train_samples, valid_samples) =
        stratified_holdout(folder.samples.clone(), args.valid_fraction, args.seed)?;
    println!(
        "  split: {} train / {} validation",
        train_samples.len(),
        valid_samples.len()
    );

    println!("{}", "decoding images...".cyan());
    let train = WasteTensorDataset::load(&train_samples, args.image_size)?;
    let valid = WasteTensorDataset::load(&valid_samples, args.image_size)?;

    // Assemble the network.
    let model_config = ModelConfig {
        num_classes,
        input_size: args.image_size,
        ..Default::default()
    };
    let model = WasteNet::<TrainingBackend>::new(&model_config, &device)?;

    let model_name = format!("wastenet_{}", Local::now().format("%Y%m%d_%H%M%S"));
    let output_dir = PathBuf::from(&args.output_dir);
    let stage_epochs: [usize; 3] = args
        .stage_epochs
        .clone()
        .try_into()
        .map_err(|_| anyhow::anyhow!("--stage-epochs takes exactly three values"))?;

    let orchestrator_config = OrchestratorConfig {
        stage_epochs,
        batch_size: args.batch_size,
        patience: args.patience,
        min_delta: args.min_delta,
        seed: args.seed,
        augment: args.augmentation,
        lr_finder: LrFinderConfig::default(),
        checkpoint_dir: output_dir.join("checkpoints"),
        model_name: model_name.clone(),
        ..Default::default()
    };

    let mut orchestrator = TrainingOrchestrator::new(model, orchestrator_config, device.clone())?;
    let report = orchestrator.run(&train, &valid)?;

    println!();
    println!("{}", "training complete".green().bold());
    println!("  epochs:        {}", report.epochs_completed);
    println!("  best macro-F1: {:.4}", report.best_metric);
    if report.stopped_early {
        println!("  {}", "stopped early on metric stagnation".yellow());
    }
    println!("  checkpoint:    {:?}", report.checkpoint_path);

    // Assess the best model on the held-out test folder.
    let test_dir = Path::new(&args.data_root).join("test");
    if test_dir.exists() {
        let best_model = orchestrator.model().valid();
        run_assessment(
            &best_model,
            &test_dir,
            args.batch_size,
            args.image_size,
            class_names,
            args.export_results.then(|| output_dir.join("results")),
            &model_name,
        )?;
    } else {
        info!("no test folder at {:?}, skipping assessment", test_dir);
    }

    Ok(())
}

fn cmd_evaluate(
    data_root: &str,
    model_path: &str,
    batch_size: usize,
    image_size: usize,
    tta: bool,
    export_results: bool,
    output_dir: &str,
) -> Result<()> {
    println!("{}", "wastenet evaluation".green().bold());
    println!("  backend: {}", backend_name());

    let device = default_device();
    let test_dir = Path::new(data_root).join("test");
    let folder = WasteFolderDataset::new(&test_dir)?;

    let model_config = ModelConfig {
        num_classes: folder.num_classes(),
        input_size: image_size,
        ..Default::default()
    };
    let model = WasteNet::<DefaultBackend>::new(&model_config, &device)?
        .load_file(model_path, &CompactRecorder::new(), &device)
        .map_err(|e| anyhow::anyhow!("failed to load checkpoint '{}': {:?}", model_path, e))?;

    let model_name = Path::new(model_path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "wastenet".to_string());

    let class_names = folder.idx_to_class.clone();
    let dataset = WasteTensorDataset::load(&folder.samples, image_size)?;

    let evaluator = Evaluator::new(&model, device, batch_size, class_names.clone());
    let results_dir = export_results.then(|| PathBuf::from(output_dir).join("results"));

    let report = evaluator.evaluate(&dataset);
    println!("\n{}", "plain pass".cyan().bold());
    println!("  {}", report.metrics.summary());
    print!("{}", report.metrics.confusion_matrix.display(Some(&class_names)));
    if let Some(dir) = &results_dir {
        evaluator.export(&report, dir, &model_name)?;
    }

    if tta {
        let tta_report = evaluator.evaluate_tta(&dataset);
        println!("\n{}", "test-time-augmented pass".cyan().bold());
        println!("  {}", tta_report.metrics.summary());
        if let Some(dir) = &results_dir {
            evaluator.export(&tta_report, dir, &format!("{}_tta", model_name))?;
        }
    }

    Ok(())
}

fn cmd_stats(data_root: &str) -> Result<()> {
    for split in ["train", "test"] {
        let dir = Path::new(data_root).join(split);
        if !dir.exists() {
            println!("{} missing split directory {:?}", "note:".yellow(), dir);
            continue;
        }
        println!("{}", format!("{} split", split).cyan().bold());
        WasteFolderDataset::new(&dir)?.stats().print();
        println!();
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_assessment(
    model: &WasteNet<DefaultBackend>,
    test_dir: &Path,
    batch_size: usize,
    image_size: usize,
    class_names: Vec<String>,
    results_dir: Option<PathBuf>,
    model_name: &str,
) -> Result<()> {
    let folder = WasteFolderDataset::new(test_dir)?;
    let dataset = WasteTensorDataset::load(&folder.samples, image_size)?;

    let evaluator = Evaluator::new(model, default_device(), batch_size, class_names.clone());

    let report = evaluator.evaluate(&dataset);
    println!("\n{}", "test set (plain)".cyan().bold());
    println!("  {}", report.metrics.summary());
    print!("{}", report.metrics.confusion_matrix.display(Some(&class_names)));

    let tta_report = evaluator.evaluate_tta(&dataset);
    println!("\n{}", "test set (TTA)".cyan().bold());
    println!("  {}", tta_report.metrics.summary());

    if let Some(dir) = results_dir {
        evaluator.export(&report, &dir, model_name)?;
        evaluator.export(&tta_report, &dir, &format!("{}_tta", model_name))?;
    }

    Ok(())
}
