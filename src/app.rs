use eframe::egui;

use crate::data::source::DashboardContext;
use crate::state::AppState;
use crate::ui::{panels, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct WilioApp {
    pub state: AppState,
}

impl WilioApp {
    pub fn new(context: DashboardContext) -> Self {
        Self {
            state: AppState::new(context),
        }
    }
}

impl eframe::App for WilioApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar and page switcher ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: filters ----
        egui::SidePanel::left("filter_panel")
            .default_width(240.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: charts and data ----
        egui::CentralPanel::default().show(ctx, |ui| {
            plot::dashboard(ui, &self.state);
        });
    }
}
