use flowrun_engine::ContainerResolver;
use flowrun_types::RunConfig;

/// Reports the container image named in the run configuration.
///
/// A blank image counts as unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfiguredContainerResolver;

impl ContainerResolver for ConfiguredContainerResolver {
    fn resolve(&self, config: &RunConfig) -> Option<String> {
        config
            .container
            .image
            .as_deref()
            .map(str::trim)
            .filter(|image| !image.is_empty())
            .map(str::to_string)
    }
}
