use std::path::Path;

use anyhow::{Context, Result};

use crate::data::source::DashboardContext;
use crate::pages::load_and_render::LoadAndRenderPage;
use crate::pages::web_vitals::WebVitalsPage;
use crate::pages::DashboardPage;

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    WebVitals,
    LoadAndRender,
}

impl Page {
    pub const ALL: [Page; 2] = [Page::WebVitals, Page::LoadAndRender];

    pub fn title(self) -> &'static str {
        match self {
            Page::WebVitals => "Web Vitals",
            Page::LoadAndRender => "Load and Render Time",
        }
    }
}

/// Outcome of the last user action, shown in the top bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Info(String),
    Error(String),
}

impl Status {
    pub fn text(&self) -> &str {
        match self {
            Status::Info(s) | Status::Error(s) => s,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Status::Error(_))
    }
}

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Config, data source and query cache.
    pub context: DashboardContext,

    /// Which page is showing.
    pub page: Page,

    /// Pages are built on first visit (None until then).
    pub web_vitals: Option<WebVitalsPage>,
    pub load_and_render: Option<LoadAndRenderPage>,

    /// Status / error message shown in the UI.
    pub status_message: Option<Status>,
}

impl AppState {
    pub fn new(context: DashboardContext) -> Self {
        let mut state = Self {
            context,
            page: Page::WebVitals,
            web_vitals: None,
            load_and_render: None,
            status_message: None,
        };
        state.ensure_loaded();
        state
    }

    /// Switch pages, loading the target on first visit.
    pub fn select_page(&mut self, page: Page) {
        self.page = page;
        self.ensure_loaded();
    }

    /// Build the current page from the (cached) query result if it does not
    /// exist yet.
    pub fn ensure_loaded(&mut self) {
        let loaded = match self.page {
            Page::WebVitals => self.web_vitals.is_some(),
            Page::LoadAndRender => self.load_and_render.is_some(),
        };
        if loaded {
            return;
        }
        if let Err(e) = self.load_current() {
            log::error!("Failed to load {}: {e:#}", self.page.title());
            self.status_message = Some(Status::Error(format!("Error: {e:#}")));
        }
    }

    fn load_current(&mut self) -> Result<()> {
        match self.page {
            Page::WebVitals => {
                let query = self.context.config.web_vitals.query.clone();
                let table = self
                    .context
                    .run_query(&query)
                    .with_context(|| format!("running query '{query}'"))?;
                self.web_vitals = Some(WebVitalsPage::new(&query, table, &self.context.config));
            }
            Page::LoadAndRender => {
                let query = self.context.config.load_and_render.query.clone();
                let table = self
                    .context
                    .run_query(&query)
                    .with_context(|| format!("running query '{query}'"))?;
                self.load_and_render =
                    Some(LoadAndRenderPage::new(&query, table, &self.context.config));
            }
        }
        self.status_message = None;
        Ok(())
    }

    /// Drop the cached result for the current page and load it again.
    pub fn reload(&mut self) {
        let query = match self.page {
            Page::WebVitals => {
                self.web_vitals = None;
                self.context.config.web_vitals.query.clone()
            }
            Page::LoadAndRender => {
                self.load_and_render = None;
                self.context.config.load_and_render.query.clone()
            }
        };
        self.context.refresh(&query);
        self.ensure_loaded();
    }

    /// The page currently showing, if it loaded.
    pub fn current(&self) -> Option<&dyn DashboardPage> {
        match self.page {
            Page::WebVitals => self.web_vitals.as_ref().map(|p| p as &dyn DashboardPage),
            Page::LoadAndRender => self
                .load_and_render
                .as_ref()
                .map(|p| p as &dyn DashboardPage),
        }
    }

    /// Export the current page's filtered rows to `path`.
    pub fn export_current(&mut self, path: &Path) -> Result<()> {
        let page = self.current().context("no page loaded")?;
        page.export(path)
            .with_context(|| format!("exporting {} to {}", page.title(), path.display()))?;
        self.status_message = Some(Status::Info(format!("Saved {}", path.display())));
        Ok(())
    }
}
