use anyhow::{Context, Result};
use culturelecture_scrape_lib::application::{LectureFilter, run};
use culturelecture_scrape_lib::infrastructure::{
    ConfigManager, ConfigSource, CsvExporter, build_collectors, init_logging_with_config,
};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = try_main().await {
        error!("❌ {:#}", e);
        eprintln!("culturelecture-scrape: {e:#}");
        std::process::exit(1);
    }
}

async fn try_main() -> Result<()> {
    let config_manager = match std::env::args().nth(1) {
        Some(path) => ConfigManager::new(path),
        None => ConfigManager::with_default_path(),
    };

    let (config, source) = config_manager.load_config_with_source().await?;
    init_logging_with_config(&config.logging)?;

    info!("########################################################");
    info!("###                                                  ###");
    info!("###            scrape-culturelecture {:<15} ###", env!("CARGO_PKG_VERSION"));
    info!("###                                                  ###");
    info!("########################################################");
    match source {
        ConfigSource::File => info!("Loaded configuration from: {:?}", config_manager.config_path()),
        ConfigSource::Defaults => info!(
            "Configuration file not found, using defaults: {:?}",
            config_manager.config_path()
        ),
    }

    config.validate()?;

    let collectors = build_collectors(&config).context("failed to set up source collectors")?;
    let filter = LectureFilter::from_config(&config)?;
    let exporter = CsvExporter::from_config(&config.export);

    let report = run(&collectors, &filter, &exporter).await?;

    info!(
        "🎉 완료: 수집 {}건, 제외 {}건, 저장 {}건 -> {}",
        report.collected,
        report.filter.excluded(),
        report.export.rows,
        report.export.path.display()
    );
    Ok(())
}
