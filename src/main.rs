#![allow(unused_variables)]
#![allow(unused_imports)]
#![allow(dead_code)]
#![allow(unused_doc_comments)]
// #![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

pub mod annotations;
pub mod appconfig;
pub mod dataset;
pub mod display;
pub mod export;
pub mod logging;
pub mod session;
pub mod ui;

use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

/// Main App
fn main() -> eframe::Result<()> {
    use ui::ui_types::App;

    let _log_guard = logging::init_logs();
    info!("Starting child_annotator {}", env!("CARGO_PKG_VERSION"));

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Image Annotator")
            .with_inner_size([1280.0, 720.0])
            .with_min_inner_size([640.0, 480.0]),
        ..Default::default()
    };
    eframe::run_native(
        "child_annotator",
        native_options,
        Box::new(|cc| Ok(Box::new(App::new(cc)))),
    )
}
