//! Password-gated web dashboard over `data_plus_prediction`.

mod server;
mod view;

pub use server::{DashboardState, router, serve};
pub use view::{DashboardView, Outlook, login_page};
