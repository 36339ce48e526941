mod app;
mod config;

use app::{TITLE, UiApp};
use eframe::{NativeOptions, egui};

const APP_VERSION: &str = env!("BLOODGROUP_VERSION");

fn main() {
    tracing_subscriber::fmt::init();
    let pipeline_config = config::load_config(&config::config_candidates());
    tracing::info!(
        "model {}, edge cut-off {}%",
        pipeline_config.model_path.display(),
        pipeline_config.min_edge_percent
    );

    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(TITLE)
            .with_inner_size([600.0, 600.0]),
        ..Default::default()
    };
    if let Err(e) = eframe::run_native(
        TITLE,
        options,
        Box::new(move |_cc| {
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(Box::new(UiApp::new(
                pipeline_config,
                APP_VERSION,
            )))
        }),
    ) {
        eprintln!("Application stopped with error: {e}");
    }
}
