use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use egui::{Color32, Vec2};

use crate::session::{Event, PendingPoint};

use super::ui_types::App;

impl App {
    pub fn canvas(&mut self, ui: &mut egui::Ui) {
        let (Some(texture), Some(mapper)) = (self.image_texture.as_ref(), self.mapper) else {
            ui.centered_and_justified(|ui| {
                ui.label("Image could not be loaded, press Next Image to skip it");
            });
            return;
        };

        let size = texture.size_vec2();
        let img = egui::Image::from_texture((texture.id(), size))
            .fit_to_exact_size(size)
            .max_size(size)
            .sense(egui::Sense::click());

        let resp = ui.add(img).on_hover_cursor(egui::CursorIcon::Crosshair);
        let rect = resp.rect;

        if resp.clicked() {
            if let Some(pos) = ui.input(|i| i.pointer.interact_pos()) {
                // relative to the bitmap's top-left corner
                let pos = pos - rect.min;
                let original = mapper.to_original(pos.x, pos.y);
                trace!("click ({:.1}, {:.1}) -> {:?}", pos.x, pos.y, original);

                let point = PendingPoint {
                    display: (pos.x, pos.y),
                    original,
                };
                self.send(ui.ctx(), Event::PointClicked(point));
            }
        }

        if let Some(point) = self.session.pending() {
            let painter = ui.painter_at(rect);
            let pos = rect.min + Vec2::new(point.display.0, point.display.1);
            painter.circle_filled(pos, self.settings.marker_radius, Color32::RED);
        }
    }
}
