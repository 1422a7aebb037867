mod automation;
mod chromium;
mod error;
mod human;
mod surface;

pub use automation::{
    BrowserAutomation, BrowserContext, BrowserLauncher, LaunchOverrides, ViewportSpec,
};
pub use chromium::{ChromiumSessionFactory, ChromiumSurface};
pub use error::{BrowserError, BrowserResult};
pub use human::{HumanMotionController, HumanMotionPlan, MotionStep};
pub use surface::{
    ItemSnapshot, LoadMoreSignal, OverlaySnapshot, ProfileHeaderSnapshot, RenderedSurface,
    SessionCookie, SessionFactory,
};
