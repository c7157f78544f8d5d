use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use egui::RichText;
use egui_extras::{Column, TableBuilder};

use crate::session::Event;

use super::ui_types::App;

impl App {
    pub fn controls(&mut self, ui: &mut egui::Ui) {
        let Some(ds) = self.session.dataset() else {
            return;
        };
        let children = ds.children.clone();

        let current = self.session.selected_child();
        let mut selected = current;
        let selected_name = children
            .iter()
            .find(|c| Some(c.child_id) == current)
            .map_or("", |c| c.name.as_str())
            .to_string();

        ui.label("Select Child");
        egui::ComboBox::from_id_salt("child_select")
            .selected_text(selected_name)
            .width(ui.available_width())
            .show_ui(ui, |ui| {
                for child in &children {
                    ui.selectable_value(&mut selected, Some(child.child_id), &child.name);
                }
            });

        if selected != current {
            if let Some(child_id) = selected {
                self.send(ui.ctx(), Event::ChildSelected(child_id));
            }
        }

        ui.add_space(8.);

        ui.horizontal(|ui| {
            let size = egui::vec2(120., 32.);
            if ui
                .add(egui::Button::new(RichText::new("Save").size(16.)).min_size(size))
                .clicked()
            {
                self.send(ui.ctx(), Event::Save);
            }
            if ui
                .add(egui::Button::new(RichText::new("Next Image").size(16.)).min_size(size))
                .clicked()
            {
                self.send(ui.ctx(), Event::Next);
            }
        });

        ui.separator();
        self.saved_points(ui);
    }

    fn saved_points(&mut self, ui: &mut egui::Ui) {
        let saved = self.session.saved_for_current();
        if saved.is_empty() {
            ui.label("Nothing saved for this image");
            return;
        }

        TableBuilder::new(ui)
            .id_salt("saved_points")
            .striped(true)
            .column(Column::auto().at_least(120.))
            .column(Column::remainder())
            .header(20., |mut header| {
                header.col(|ui| {
                    ui.strong("Child");
                });
                header.col(|ui| {
                    ui.strong("Center");
                });
            })
            .body(|mut body| {
                for (name, [x, y]) in saved {
                    body.row(18., |mut row| {
                        row.col(|ui| {
                            ui.label(name);
                        });
                        row.col(|ui| {
                            ui.label(format!("[{}, {}]", x, y));
                        });
                    });
                }
            });
    }
}
