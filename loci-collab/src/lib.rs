mod auth;
mod db;
mod images;
mod palaces;
mod study;
mod util;

use std::path::PathBuf;
use std::sync::Arc;

pub use auth::*;
pub use db::*;
pub use images::*;
pub use palaces::*;
pub use study::*;

/// Runtime configuration shared by the collab system
#[derive(Debug, Clone)]
pub struct CollabConfig {
    /// Where uploaded images are stored
    pub media_dir: PathBuf,
}

/// The loci collab system, facilitating palace management, study sessions,
/// and authentication.
pub struct Collab<Db> {
    database: Arc<Db>,

    pub auth: Auth<Db>,
    pub palaces: PalaceManager<Db>,
    pub study: StudyManager<Db>,
}

/// A type passed to the managers of the collab system, to access shared state.
pub struct CollabContext<Db> {
    pub database: Arc<Db>,
    pub config: Arc<CollabConfig>,
}

impl<Db> Collab<Db>
where
    Db: Database,
{
    pub fn new(database: Db, config: CollabConfig) -> Self {
        let database = Arc::new(database);

        let context = CollabContext {
            database: database.clone(),
            config: Arc::new(config),
        };

        Self {
            auth: Auth::new(&context.database),
            palaces: PalaceManager::new(&context),
            study: StudyManager::new(&context),
            database,
        }
    }

    /// Direct access to the underlying database
    pub fn database(&self) -> &Arc<Db> {
        &self.database
    }
}

impl<Db> Clone for CollabContext<Db>
where
    Db: Database,
{
    fn clone(&self) -> Self {
        Self {
            database: self.database.clone(),
            config: self.config.clone(),
        }
    }
}
