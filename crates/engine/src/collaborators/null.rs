use std::path::Path;

use flowrun_types::{RepositoryInfo, RunConfig};

use super::{ContainerResolver, VcsProvenance};

pub struct NoRepository;

impl VcsProvenance for NoRepository {
    fn lookup(&self, _directory: &Path) -> Option<RepositoryInfo> {
        None
    }
}

pub struct NoContainer;

impl ContainerResolver for NoContainer {
    fn resolve(&self, _config: &RunConfig) -> Option<String> {
        None
    }
}
