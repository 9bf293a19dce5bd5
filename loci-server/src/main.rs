use std::{env, path::PathBuf, sync::Arc};

use loci_collab::{Collab, CollabConfig, PgDatabase};
use loci_server::{init_logger, run_server, ServerContext};

#[tokio::main]
async fn main() {
    init_logger();

    let database_url = env::var("LOCI_DATABASE_URL").expect("LOCI_DATABASE_URL is set");
    let media_dir = env::var("LOCI_MEDIA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("media"));

    let database = PgDatabase::new(&database_url)
        .await
        .expect("database is reachable");

    let collab = Collab::new(database, CollabConfig { media_dir });

    run_server(ServerContext {
        collab: Arc::new(collab),
    })
    .await;
}
