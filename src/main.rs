mod app;
mod color;
mod config;
mod data;
mod error;
mod pages;
mod state;
mod ui;

use anyhow::{anyhow, Context};
use app::WilioApp;
use config::DashboardConfig;
use data::source::DashboardContext;
use eframe::egui;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = DashboardConfig::load().context("loading dashboard configuration")?;
    log::info!(
        "Reading data from {} (cache ttl {} min)",
        config.data_root.display(),
        config.cache_ttl_minutes
    );
    let context = DashboardContext::from_config(config);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "wilio – Web Vitals dashboards",
        options,
        Box::new(move |_cc| Ok(Box::new(WilioApp::new(context)))),
    )
    .map_err(|e| anyhow!("{e}"))
}
