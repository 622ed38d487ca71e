//! Storage eviction: disk probing, the ordered deletion policy and its scheduler.

mod policy;
mod probe;
mod service;

pub use policy::{ArtifactRule, EvictionPolicy, EvictionReport};
pub use probe::{DiskProbe, DiskUsageSample, StatvfsProbe};
pub use service::EvictionService;

#[cfg(test)]
pub(crate) mod test_probe {
    use std::path::Path;

    use walkdir::WalkDir;

    use super::{DiskProbe, DiskUsageSample};
    use crate::error::FsOpsResult;

    /// Pretends the filesystem holds exactly the files under the probed path.
    #[derive(Debug, Clone, Copy)]
    pub(crate) struct TreeProbe {
        pub(crate) capacity: u64,
    }

    impl DiskProbe for TreeProbe {
        fn sample(&self, path: &Path) -> FsOpsResult<DiskUsageSample> {
            let used: u64 = WalkDir::new(path)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().is_file())
                .filter_map(|entry| entry.metadata().ok())
                .map(|metadata| metadata.len())
                .sum();
            Ok(DiskUsageSample::new(
                self.capacity,
                used,
                self.capacity.saturating_sub(used),
            ))
        }
    }
}
