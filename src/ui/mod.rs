pub mod canvas;
pub mod controls;
pub mod ui_types;

use std::path::{Path, PathBuf};

use ui_types::*;

use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use egui::{Align, Color32, Layout, RichText};

use crate::{
    appconfig::{AppSettings, CONFIG_FILE},
    dataset::Dataset,
    display::load_display_image,
    export::{timestamped_file_name, Exporter},
    session::{Effect, Event, ExportTarget, Stage},
};

/// New
impl App {
    /// Called once before the first frame.
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let mut out: Self = if let Some(storage) = cc.storage {
            eframe::get_value(storage, eframe::APP_KEY).unwrap_or_default()
        } else {
            Default::default()
        };

        out.settings = AppSettings::load_or_default(CONFIG_FILE);
        out.exporter = Exporter::new(out.settings.cache_image_dimensions);

        out
    }
}

/// session plumbing
impl App {
    pub fn open_folder(&mut self, ctx: &egui::Context, root: PathBuf) {
        debug!("Opening {}", root.display());
        match Dataset::open(&root) {
            Ok(dataset) => {
                self.last_folder = Some(root);
                let effects = self.session.handle(Event::FolderOpened(dataset));
                self.apply(ctx, effects);
            }
            Err(e) => {
                error!("Failed to open folder: {}", e);
                self.errors.push(e.to_string());
            }
        }
    }

    pub fn send(&mut self, ctx: &egui::Context, event: Event) {
        let effects = self.session.handle(event);
        self.apply(ctx, effects);
    }

    fn apply(&mut self, ctx: &egui::Context, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::LoadImage(index) => self.load_image(ctx, index),
                Effect::ShowError(msg) => {
                    warn!("{}", msg);
                    self.modal_error = Some(msg);
                }
                Effect::Export(target) => {
                    if let Err(e) = self.export(target) {
                        error!("Export failed: {:#}", e);
                        self.errors.push(format!("Export failed: {:#}", e));
                    }
                }
                Effect::ScheduleClose => {
                    self.image_texture = None;
                    self.mapper = None;
                    self.close_at = Some(self.settings.close_deadline(std::time::Instant::now()));
                }
            }
        }
    }

    fn load_image(&mut self, ctx: &egui::Context, index: usize) {
        self.image_texture = None;
        self.mapper = None;

        let Some(path) = self.session.dataset().and_then(|ds| ds.image_path(index)) else {
            error!("No image at index {}", index);
            return;
        };

        match load_display_image(&path, self.settings.display_bound()) {
            Ok(display) => {
                let texture =
                    ctx.load_texture("group_image", display.to_color_image(), Default::default());
                self.image_texture = Some(texture);
                self.mapper = Some(display.mapper);
            }
            Err(e) => {
                error!("Failed to load {}: {:#}", path.display(), e);
                self.errors.push(format!("Failed to load {}: {:#}", path.display(), e));
            }
        }
    }

    fn export(&mut self, target: ExportTarget) -> Result<PathBuf> {
        let dataset = self
            .session
            .dataset()
            .context("Export requested without a dataset")?;

        let file_name = match target {
            ExportTarget::Rolling => self.settings.export_file_name.clone(),
            ExportTarget::Timestamped => timestamped_file_name(
                &self.settings.export_prefix,
                chrono::Local::now().naive_local(),
            ),
        };

        self.exporter
            .export(dataset, self.session.store(), &file_name)
    }
}

/// panels
impl App {
    fn header(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            match (self.session.stage(), self.session.dataset()) {
                (Stage::Annotating(i), Some(ds)) => {
                    ui.label(
                        RichText::new(format!(
                            "Image {} / {}: {}",
                            i + 1,
                            ds.image_count(),
                            ds.image_files[i]
                        ))
                        .strong(),
                    );
                }
                (Stage::AwaitingFolderSelection, _) => {
                    ui.label("Choose a folder containing group/ and single/");
                }
                _ => {}
            }

            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                egui::widgets::global_theme_preference_buttons(ui);
            });
        });
    }

    fn errors_list(&mut self, ui: &mut egui::Ui) {
        if self.errors.is_empty() {
            return;
        }

        ui.heading("Errors");
        ui.horizontal(|ui| {
            if ui.button("Clear All").clicked() {
                self.errors.clear();
            }

            let error_count = self.errors.len();
            ui.label(format!(
                "({} error{})",
                error_count,
                if error_count == 1 { "" } else { "s" }
            ));
        });

        egui::ScrollArea::vertical()
            .id_salt("errors")
            .max_height(200.0)
            .show(ui, |ui| {
                // newest first
                for error in self.errors.iter().rev() {
                    ui.label(RichText::new(error).color(Color32::from_rgb(255, 100, 100)));
                    ui.separator();
                }
            });

        ui.separator();
    }

    fn start_screen(&mut self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            ui.add_space(40.);

            if ui
                .button(RichText::new("Select Folder").size(18.))
                .clicked()
            {
                if let Some(folder) = rfd::FileDialog::new()
                    .set_title("Select Folder")
                    .pick_folder()
                {
                    self.open_folder(ui.ctx(), folder);
                }
            }

            if let Some(last) = self.last_folder.clone() {
                ui.add_space(10.);
                if ui
                    .button(format!("Open last folder: {}", last.display()))
                    .clicked()
                {
                    self.open_folder(ui.ctx(), last);
                }
            }
        });
    }

    fn all_done(&mut self, ui: &mut egui::Ui) {
        ui.centered_and_justified(|ui| {
            ui.label(RichText::new("All is done").size(24.).color(ui.visuals().strong_text_color()));
        });
    }

    fn error_modal(&mut self, ctx: &egui::Context) {
        let Some(msg) = self.modal_error.clone() else {
            return;
        };

        let mut ok = false;
        let modal = egui::Modal::new(egui::Id::new("error_modal")).show(ctx, |ui| {
            ui.set_width(280.);
            ui.heading("Error");
            ui.label(&msg);
            ui.add_space(8.);
            ok = ui.button("OK").clicked();
        });

        if ok || modal.should_close() {
            self.modal_error = None;
        }
    }

    fn check_close_timer(&mut self, ctx: &egui::Context) {
        let Some(at) = self.close_at else {
            return;
        };

        let now = std::time::Instant::now();
        if now >= at {
            self.close_at = None;
            self.send(ctx, Event::CloseTimerElapsed);
        } else {
            ctx.request_repaint_after(at - now);
        }
    }
}

impl eframe::App for App {
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        eframe::set_value(storage, eframe::APP_KEY, self);
    }

    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }

        self.check_close_timer(ctx);

        if self.session.stage() == Stage::Terminated {
            info!("Closing");
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            return;
        }

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            self.header(ui);
        });

        egui::SidePanel::right("controls")
            .resizable(false)
            .exact_width(280.)
            .show(ctx, |ui| {
                self.errors_list(ui);

                if self.session.accepts_input() {
                    self.controls(ui);
                }
            });

        egui::CentralPanel::default().show(ctx, |ui| match self.session.stage() {
            Stage::AwaitingFolderSelection => self.start_screen(ui),
            Stage::Annotating(_) => self.canvas(ui),
            Stage::AllDone | Stage::Terminated => self.all_done(ui),
        });

        self.error_modal(ctx);
    }
}
