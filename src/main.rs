// Command-line front end for the leverage journal

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use std::fs;

use leverage_journal_lib::commands::{preview_stats, ImportMode, StateManager};
use leverage_journal_lib::config::{AppConfig, CliConfig, Command, PortfolioCommand};
use leverage_journal_lib::db::{Database, KeyValueStore};
use leverage_journal_lib::models::{RemakeParams, TradeInputs, UpdateableField};
use leverage_journal_lib::stats::{dec2, Stats};
use leverage_journal_lib::SystemClock;

fn print_stats(stats: &Stats) {
    println!("Direction:             {}", stats.direction);
    println!("End equity:            {}", dec2(stats.end_equity));
    println!("Equity at stop:        {}", dec2(stats.equity_at_stop));
    println!("Start leverage:        {}", dec2(stats.start_lev));
    println!("End leverage:          {}", dec2(stats.end_lev));
    println!("Stop leverage:         {}", dec2(stats.stop_lev));
    println!("Liquidation price:     {}", dec2(stats.liq_price));
    println!("Mango liq price:       {}", dec2(stats.mango_liq_price));
    println!("Profit/loss:           {}", dec2(stats.profit_loss));
    println!("Change:                {}%", dec2(stats.change * 100.0));
    println!("Stop loss:             {}", dec2(stats.stop_loss));
    println!("Max loss:              {}%", dec2(stats.max_loss * 100.0));
    println!("Move to ideal:         {}%", dec2(stats.percent_move_to_ideal * 100.0));
    println!("Move to stop:          {}%", dec2(stats.percent_move_to_stop * 100.0));
    println!("Risk to reward:        {}", dec2(stats.risk_to_reward));
}

fn inputs(start_equity: String, entry_price: String, stop_price: String, ideal_exit: String, size: String) -> TradeInputs {
    TradeInputs {
        start_equity,
        entry_price,
        stop_price,
        ideal_exit_price: ideal_exit,
        size,
    }
}

fn run<S: KeyValueStore>(manager: &mut StateManager<S, SystemClock>, command: Command) -> Result<()> {
    match command {
        Command::Show => {
            println!("{}", serde_json::to_string_pretty(manager.state())?);
        }
        Command::Preview { start_equity, entry_price, stop_price, ideal_exit, size } => {
            let stats = preview_stats(&inputs(start_equity, entry_price, stop_price, ideal_exit, size))?;
            print_stats(&stats);
        }
        Command::Add { start_equity, entry_price, stop_price, ideal_exit, size } => {
            let id = manager.add_trade(&inputs(start_equity, entry_price, stop_price, ideal_exit, size))?;
            println!("{}", id);
        }
        Command::Start { id } => {
            manager.start_trade(&id)?;
        }
        Command::Finish { id, stopped } => {
            manager.finish_trade(&id, stopped)?;
        }
        Command::Back { id } => {
            manager.back_to_staging(&id)?;
        }
        Command::Lock { id } => {
            manager.lock_trade(&id)?;
        }
        Command::Edit { id, field, value } => {
            let field: UpdateableField = field.parse()?;
            manager.edit_trade_field(&id, field, &value)?;
        }
        Command::Notes { id, notes } => {
            manager.set_trade_notes(&id, &notes)?;
        }
        Command::Duplicate { id } => {
            println!("{}", manager.duplicate_trade(&id)?);
        }
        Command::Delete { id } => {
            manager.delete_trade(&id)?;
        }
        Command::Up { list, index } => {
            manager.move_up(list.into(), index)?;
        }
        Command::Down { list, index } => {
            manager.move_down(list.into(), index)?;
        }
        Command::ClearStaging => {
            manager.clear_staging()?;
        }
        Command::Portfolio { action } => match action {
            PortfolioCommand::List => {
                let selected = &manager.state().portfolios.selected_portfolio;
                for name in manager.state().portfolios.names() {
                    let marker = if name == selected.as_str() { "*" } else { " " };
                    println!("{} {}", marker, name);
                }
            }
            PortfolioCommand::Select { name } => {
                manager.select_portfolio(&name)?;
            }
            PortfolioCommand::Create { name } => {
                manager.create_portfolio(&name)?;
            }
            PortfolioCommand::Rename { old_name, new_name } => {
                manager.rename_portfolio(&old_name, &new_name)?;
            }
            PortfolioCommand::Delete { name } => {
                manager.delete_portfolio(&name)?;
            }
        },
        Command::SetName { name } => {
            manager.set_name(&name)?;
        }
        Command::SetTimezone { timezone } => {
            manager.set_timezone(&timezone)?;
        }
        Command::SetRemake { avg_loss, avg_gain_per_loss_factor, stop_loss, goal, start, win_rate } => {
            manager.set_remake_params(RemakeParams {
                avg_loss,
                avg_gain_per_loss_factor,
                stop_loss,
                goal,
                start,
                win_rate,
            })?;
        }
        Command::Stats { id } => {
            print_stats(&manager.trade_stats(&id)?);
        }
        Command::Summary { portfolio } => {
            let summary = manager.portfolio_summary(portfolio.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Export { out_dir } => {
            let exported = manager.admin().download()?;
            let path = out_dir.join(&exported.file_name);
            fs::write(&path, exported.contents)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{}", path.display());
        }
        Command::Import { path, verbatim } => {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let mode = if verbatim { ImportMode::Verbatim } else { ImportMode::Migrate };
            manager.admin().upload(&raw, mode)?;
        }
        Command::Reset => {
            manager.admin().reset()?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = CliConfig::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level)).init();

    let config = AppConfig::from_cli(&cli)?;
    config.ensure_data_dir()?;
    info!("Database path: {}", config.db_path.display());

    let database = Database::new(config.db_path_str()?).map_err(|e| {
        error!("Database initialization failed: {}", e);
        error!("Pre-migration backups are kept in the document_backups table of {}", config.db_path.display());
        e
    })?;

    let mut manager = StateManager::load(database, SystemClock, &config.storage_key)?;
    run(&mut manager, cli.command)
}
