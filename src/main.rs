mod cli;

use anyhow::{bail, Result};
use clap::Parser;
use cli::{Args, ProgressObserver};
use prompt2manga::core::config::Config;
use prompt2manga::core::io::{NativeStorage, Storage};
use prompt2manga::services::artifacts::ArtifactWriter;
use prompt2manga::services::client::create_client;
use prompt2manga::services::observer::LogObserver;
use prompt2manga::services::workflow::MangaPipeline;
use prompt2manga::utils::text::preview;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let mut config = match Config::load(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {:#}", e);
            return Err(e);
        }
    };
    args.apply(&mut config);
    config.ensure_directories()?;

    let storage: Arc<dyn Storage> = Arc::new(NativeStorage::new());
    let prompt = cli::read_prompt(&args, storage.as_ref()).await?;
    let pdf_path = args.pdf_path(&config);

    println!("Configuration: {}", config.pipeline);
    println!("Prompt: {}", preview(&prompt, 200));

    let client = create_client(&config)?;
    let artifacts = ArtifactWriter::new(
        storage.clone(),
        config.output_folder.clone(),
        pdf_path.clone(),
    );

    let pipeline = MangaPipeline::new(client, config.pipeline)
        .with_concurrency(config.effective_concurrency())
        .with_observer(Arc::new(LogObserver))
        .with_observer(Arc::new(ProgressObserver::new(config.pipeline)?))
        .with_observer(Arc::new(artifacts));

    let result = pipeline.run(&prompt).await?;
    cli::print_summary(&result, &pdf_path);

    if result.document.is_none() {
        bail!("No pages were generated");
    }
    Ok(())
}
