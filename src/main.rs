//! Shortbox GUI
//!
//! Single-window desktop app: one trigger to pick a source video, a save
//! dialog for the destination, an indeterminate spinner while the worker
//! converts, and a terminal status line. The window closing ends the
//! process; there are no CLI flags and no batch mode.

use std::path::{Path, PathBuf};
use std::time::Duration;

use eframe::egui;

use shortbox::controller::{self, Controller};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("shortbox=info".parse()?),
        )
        .init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([600.0, 400.0])
            .with_min_inner_size([480.0, 320.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Shorts Video Converter",
        options,
        Box::new(|_cc| Ok(Box::new(ConverterApp::default()))),
    )
    .map_err(|e| anyhow::anyhow!("failed to run UI: {e}"))
}

#[derive(Default)]
struct ConverterApp {
    controller: Controller,
    selected_label: Option<String>,
}

impl eframe::App for ConverterApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Terminal events update the controller's status line; the label
        // below renders it on this same pass.
        self.controller.poll();
        if self.controller.is_converting() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(24.0);
                ui.heading("Shorts Video Converter");
                ui.add_space(20.0);

                let busy = self.controller.is_converting();
                let button = egui::Button::new("Select Video").min_size(egui::vec2(200.0, 36.0));
                if ui.add_enabled(!busy, button).clicked() {
                    self.on_select_video();
                }

                ui.add_space(12.0);
                match &self.selected_label {
                    Some(name) => ui.label(format!("Selected: {}", name)),
                    None => ui.label("No file selected"),
                };

                ui.add_space(12.0);
                if busy {
                    ui.spinner();
                    ui.add_space(8.0);
                }
                ui.label(self.controller.status().to_string());
            });
        });
    }
}

impl ConverterApp {
    /// The single trigger: pick a source, then immediately prompt for the
    /// destination. Cancelling either dialog is a no-op.
    fn on_select_video(&mut self) {
        let source = match rfd::FileDialog::new()
            .set_title("Select Video File")
            .add_filter("Video Files", &["mp4", "avi", "mov", "mkv"])
            .add_filter("All Files", &["*"])
            .pick_file()
        {
            Some(path) => path,
            None => return,
        };

        self.selected_label = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        if !self.controller.select_source(source.clone()) {
            return;
        }

        let output = match save_dialog(&source) {
            Some(path) => path,
            None => return,
        };

        self.controller.start_conversion(output);
    }
}

/// Save dialog defaulting to `<source-stem>_shorts.mp4` next to the source.
fn save_dialog(source: &Path) -> Option<PathBuf> {
    let suggested = controller::default_output_path(source);
    let mut dialog = rfd::FileDialog::new()
        .set_title("Save Converted Video")
        .add_filter("MP4 Files", &["mp4"]);
    if let Some(dir) = suggested.parent() {
        dialog = dialog.set_directory(dir);
    }
    if let Some(name) = suggested.file_name() {
        dialog = dialog.set_file_name(name.to_string_lossy());
    }
    dialog.save_file()
}
