use std::sync::Arc;

use axum::extract::FromRef;
use loci_collab::{Collab, PgDatabase};

#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub collab: Arc<Collab<PgDatabase>>,
}
