//! Backtest command implementation.

use super::{paper_config, parse_params, parse_timeframe};
use crate::cli::{BacktestArgs, OutputFormat};
use anyhow::{Context, Result};
use chainbot_config::AppConfig;
use chainbot_data::load_csv;
use chainbot_engine::{BacktestConfig, Backtester};
use tracing::info;

pub async fn run(args: BacktestArgs, config: AppConfig) -> Result<()> {
    info!("Starting backtest for strategy: {}", args.strategy);

    if !args.data.is_file() {
        anyhow::bail!(
            "Data file '{}' does not exist. Provide a CSV with timestamp,open,high,low,close,volume columns",
            args.data.display()
        );
    }
    let path = args
        .data
        .to_str()
        .context("Data path is not valid UTF-8")?;
    let bars = load_csv(path).await.context("Failed to load data")?;
    info!(bars = bars.len(), "data loaded");

    let mut backtest = BacktestConfig::new(&args.strategy, args.symbol.to_uppercase());
    backtest.timeframe = parse_timeframe(&args.timeframe)?;
    backtest.parameters = parse_params(args.params.as_deref())?;
    backtest.paper = paper_config(&config);
    if let Some(capital) = args.capital {
        backtest.paper.initial_capital = capital;
    }
    backtest.risk = config.risk.clone();
    backtest.stop_loss_pct = args.stop_loss;

    let report = Backtester::new(backtest).run(&bars).await?;

    match args.output {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Text => println!("{}", report.summary()),
    }

    if let Some(save_path) = &args.save {
        let is_csv = save_path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        let contents = if is_csv {
            report.equity_to_csv()
        } else {
            report.to_json()?
        };
        std::fs::write(save_path, contents)
            .with_context(|| format!("Failed to write {}", save_path.display()))?;
        info!("Results saved to {:?}", save_path);
    }

    Ok(())
}
