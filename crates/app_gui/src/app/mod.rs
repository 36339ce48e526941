//! Main window: upload, preview, predict and result text.

mod preview;

use bloodgroup_core::{
    CheckedImage, PROGRESS_MESSAGE, PipelineConfig, PredictionSession, ProgressObserver, SUPPORTED_EXTENSIONS,
    StatusMessage, Tone, is_supported_image,
};
use eframe::{App, Frame, egui};
use preview::{PREVIEW_SIZE, centered_fit, load_preview};
use rfd::FileDialog;
use std::path::PathBuf;

pub(crate) const TITLE: &str = "Fingerprint Blood Group Prediction";

const ACCENT: egui::Color32 = egui::Color32::from_rgb(0xff, 0x4d, 0x4d);
const SUCCESS: egui::Color32 = egui::Color32::from_rgb(0x4c, 0xaf, 0x50);
const PANEL_GRAY: egui::Color32 = egui::Color32::from_rgb(0xf2, 0xf2, 0xf2);
const BUTTON_SIZE: egui::Vec2 = egui::vec2(200.0, 40.0);

/// Tracks whether the "in progress" label should be visible.
#[derive(Debug, Default)]
pub(crate) struct LoadingIndicator {
    visible: bool,
}

impl ProgressObserver for LoadingIndicator {
    fn started(&mut self) {
        self.visible = true;
    }

    fn finished(&mut self) {
        self.visible = false;
    }
}

/// A requested prediction waits until a frame showing the progress label
/// has been presented, then runs at the start of the following frame.
#[derive(Debug, Default)]
enum PredictPhase {
    #[default]
    Idle,
    Requested(CheckedImage),
    LabelShown(CheckedImage),
}

pub(crate) struct UiApp {
    session: PredictionSession,
    preview: Option<egui::TextureHandle>,
    status: Option<StatusMessage>,
    loading: LoadingIndicator,
    phase: PredictPhase,
    // Whether the current pass laid out the progress label.
    progress_drawn: bool,
    version: String,
}

impl UiApp {
    pub(crate) fn new(config: PipelineConfig, version: impl Into<String>) -> Self {
        Self {
            session: PredictionSession::new(config),
            preview: None,
            status: None,
            loading: LoadingIndicator::default(),
            phase: PredictPhase::Idle,
            progress_drawn: false,
            version: version.into(),
        }
    }

    fn busy(&self) -> bool {
        !matches!(self.phase, PredictPhase::Idle) || self.loading.visible
    }

    fn upload_image(&mut self, ctx: &egui::Context) {
        let picked = FileDialog::new()
            .add_filter("Image files", &SUPPORTED_EXTENSIONS)
            .set_directory(".")
            .pick_file();
        self.apply_selection(ctx, picked);
    }

    /// A cancelled picker clears the selection.
    fn apply_selection(&mut self, ctx: &egui::Context, picked: Option<PathBuf>) {
        match picked {
            Some(path) => {
                self.preview = load_preview(ctx, &path);
                self.session.select_image(path);
                self.status = None;
            }
            None => {
                self.session.clear_selection();
                self.preview = None;
            }
        }
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        let Some(path) = dropped
            .into_iter()
            .filter_map(|f| f.path)
            .find(|p| is_supported_image(p))
        else {
            return;
        };
        if !self.busy() {
            self.apply_selection(ctx, Some(path));
        }
    }

    fn request_prediction(&mut self, ctx: &egui::Context) {
        match self.session.check_preconditions() {
            Ok(image) => {
                self.phase = PredictPhase::Requested(image);
                ctx.request_repaint();
            }
            Err(e) => self.status = Some(StatusMessage::from_outcome(&Err(e))),
        }
    }

    /// Start of a pass: run a prediction whose progress label is already on screen.
    fn run_pending_prediction(&mut self) {
        let image = match std::mem::take(&mut self.phase) {
            PredictPhase::LabelShown(image) => image,
            other => {
                self.phase = other;
                return;
            }
        };
        // Blocking on the UI thread; the window freezes until inference is done.
        let outcome = self.session.predict_checked(&image, &mut self.loading);
        self.status = Some(StatusMessage::from_outcome(&outcome));
    }

    /// End of a pass: once a presented frame carries the progress label, let
    /// the next frame run the prediction.
    fn note_progress_presented(&mut self, ctx: &egui::Context) {
        if !self.progress_drawn || ctx.will_discard() {
            return;
        }
        if let PredictPhase::Requested(image) = &self.phase {
            self.phase = PredictPhase::LabelShown(image.clone());
            ctx.request_repaint();
        }
    }

    fn render_preview(&self, ui: &mut egui::Ui) {
        let side = PREVIEW_SIZE as f32;
        let (resp, painter) = ui.allocate_painter(egui::vec2(side, side), egui::Sense::hover());
        let r = resp.rect;
        painter.rect_filled(r, 4.0, PANEL_GRAY);
        if let Some(tex) = &self.preview {
            let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
            painter.image(tex.id(), centered_fit(r, tex.size_vec2()), uv, egui::Color32::WHITE);
        } else {
            painter.rect_stroke(
                r,
                4.0,
                egui::Stroke::new(1.0, egui::Color32::LIGHT_GRAY),
                egui::StrokeKind::Inside,
            );
        }
    }
}

pub(crate) fn tone_color(tone: Tone) -> egui::Color32 {
    match tone {
        Tone::Success => SUCCESS,
        Tone::Error => egui::Color32::RED,
    }
}

impl App for UiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        self.draw(ctx);
    }
}

impl UiApp {
    fn draw(&mut self, ctx: &egui::Context) {
        self.run_pending_prediction();
        self.handle_dropped_files(ctx);
        self.progress_drawn = false;

        egui::TopBottomPanel::bottom("footer").show(ctx, |ui| {
            ui.weak(format!("v{}", self.version));
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(12.0);
                egui::Frame::new()
                    .fill(ACCENT)
                    .inner_margin(egui::Margin::symmetric(20, 10))
                    .show(ui, |ui| {
                        ui.label(
                            egui::RichText::new(TITLE)
                                .size(20.0)
                                .strong()
                                .color(egui::Color32::WHITE),
                        );
                    });
                ui.add_space(16.0);

                let upload_box = egui::Button::new(
                    egui::RichText::new("Click to Upload Fingerprint Image").size(14.0),
                )
                .fill(PANEL_GRAY)
                .stroke(egui::Stroke::new(2.0, ACCENT))
                .min_size(egui::vec2(320.0, 56.0));
                if ui.add_enabled(!self.busy(), upload_box).clicked() {
                    self.upload_image(ctx);
                }
                ui.add_space(10.0);

                self.render_preview(ui);
                ui.add_space(10.0);

                let upload_button = egui::Button::new(
                    egui::RichText::new("Upload Image")
                        .strong()
                        .color(egui::Color32::WHITE),
                )
                .fill(ACCENT)
                .min_size(BUTTON_SIZE);
                if ui.add_enabled(!self.busy(), upload_button).clicked() {
                    self.upload_image(ctx);
                }
                ui.add_space(10.0);

                if self.busy() {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label(egui::RichText::new(PROGRESS_MESSAGE).size(12.0));
                    });
                    ui.add_space(10.0);
                    self.progress_drawn = true;
                }

                let predict_button = egui::Button::new(
                    egui::RichText::new("Predict Blood Group")
                        .strong()
                        .color(egui::Color32::WHITE),
                )
                .fill(SUCCESS)
                .min_size(BUTTON_SIZE);
                if ui.add_enabled(!self.busy(), predict_button).clicked() {
                    self.request_prediction(ctx);
                }
                ui.add_space(16.0);

                if let Some(status) = &self.status {
                    ui.label(
                        egui::RichText::new(&status.text)
                            .size(14.0)
                            .strong()
                            .color(tone_color(status.tone)),
                    );
                }
            });
        });

        self.note_progress_presented(ctx);
    }
}
