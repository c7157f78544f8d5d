use std::path::PathBuf;

use crate::{
    appconfig::AppSettings, display::CoordinateMapper, export::Exporter, session::Session,
};

#[derive(serde::Serialize, serde::Deserialize, Default)]
pub struct App {
    /// offered on the start screen next time
    pub last_folder: Option<PathBuf>,

    #[serde(skip)]
    pub settings: AppSettings,

    #[serde(skip)]
    pub errors: Vec<String>,

    #[serde(skip)]
    pub session: Session,

    #[serde(skip)]
    pub exporter: Exporter,

    #[serde(skip)]
    pub image_texture: Option<egui::TextureHandle>,

    #[serde(skip)]
    pub mapper: Option<CoordinateMapper>,

    /// shown as a modal until dismissed
    #[serde(skip)]
    pub modal_error: Option<String>,

    #[serde(skip)]
    pub close_at: Option<std::time::Instant>,
}
