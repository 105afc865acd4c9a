pub mod messages;
pub mod middleware;
pub mod reports;
pub mod session;

use std::sync::Arc;

use ember_core::Engine;
use ember_db::Database;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub engine: Engine,
    pub jwt_secret: String,
}
