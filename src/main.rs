use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use log::info;

use dermalens::{
    BuiltinModel, FusionClassifier, InferenceService, Verdict, WeightStore,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the lesion photograph (JPEG or PNG)
    image: PathBuf,

    /// Force a fresh download of the weight files
    #[arg(short, long)]
    fresh: bool,

    /// Force the horizontal-flip augmentation on or off instead of the
    /// random default
    #[arg(long)]
    flip: Option<bool>,
}

async fn ensure_weights_downloaded(fresh: bool) -> Result<()> {
    let store = WeightStore::new_default()?;
    let model = BuiltinModel::HybridSkinV1;

    if fresh {
        info!("Fresh download requested - removing any existing weight files...");
        store.remove_download(model)?;
    }

    store.ensure_downloaded(model).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    // Startup phase: weight acquisition and model load are unrecoverable
    // failures for this process
    ensure_weights_downloaded(args.fresh).await?;

    let start_time = Instant::now();
    info!("Building classifier...");
    let classifier = Arc::new(
        FusionClassifier::builder()
            .with_model(BuiltinModel::HybridSkinV1)?
            .build()?,
    );
    info!(
        "=== Classifier Built Successfully (took {:.2?}) ===",
        start_time.elapsed()
    );

    let mut service = InferenceService::new(Arc::clone(&classifier));
    if let Some(flip) = args.flip {
        service = service.with_flip_decision(move || flip);
    }

    let analyze_start = Instant::now();
    let result = dermalens::load_image(&args.image).and_then(|image| {
        info!(
            "Loaded {} ({}x{})",
            args.image.display(),
            image.width(),
            image.height()
        );
        service.diagnose(&image)
    });
    match result {
        Ok(report) => {
            println!("\nResults:");
            match &report.diagnosis.verdict {
                Verdict::Condition(label) => println!("  Probable diagnosis: {}", label),
                Verdict::Uncertain => println!(
                    "  Probable diagnosis: none/uncertain (top '{}' below threshold)",
                    report.diagnosis.top_label
                ),
            }
            println!(
                "  Confidence: {:.2}%",
                report.diagnosis.confidence * 100.0
            );

            let mut scores: Vec<_> = report.confidences.iter().collect();
            scores.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));
            println!("  Class probabilities (sorted):");
            for (label, score) in scores {
                println!("    {}: {:.1}%", label, score * 100.0);
            }
            info!("Analysis took {:.2?}", analyze_start.elapsed());
        }
        Err(e) => {
            // Per-request failures must not take the process down; the
            // loaded model remains usable
            eprintln!("\nAnalysis failed: {}", e);
            eprintln!("Consider:");
            eprintln!("  - Checking that the file is a valid JPEG or PNG image");
            eprintln!("  - Re-running with --fresh if the weight cache may be corrupt");
        }
    }

    Ok(())
}
