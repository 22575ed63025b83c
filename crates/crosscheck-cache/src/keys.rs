//! Cache key derivation.

use crosscheck_core::workflow::{CacheSettings, JobSpec};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Derive the cache key for one job instance.
///
/// Shape: `{namespace}-{os}` with a fingerprint suffix when lockfiles are
/// configured. The namespace defaults to the job name so jobs with different
/// provisioning needs never collide.
pub fn instance_key(job: &JobSpec, os: &str) -> String {
    let settings = job.cache.clone().unwrap_or_default();
    let namespace = settings.namespace.as_deref().unwrap_or(&job.name);
    let base = format!("{}-{}", namespace, os);

    if settings.lockfiles.is_empty() {
        return base;
    }

    let paths: Vec<&Path> = settings.lockfiles.iter().map(Path::new).collect();
    format!("{}-{}", base, fingerprint(&paths))
}

/// Fingerprint file contents into a short stable hash. Unreadable files are
/// skipped so the key stays derivable before a checkout exists.
pub fn fingerprint(file_paths: &[&Path]) -> String {
    let mut hasher = Sha256::new();

    for path in file_paths {
        hasher.update(path.to_string_lossy().as_bytes());
        if let Ok(contents) = std::fs::read(path) {
            hasher.update(&contents);
        }
    }

    let hash = hasher.finalize();
    hex::encode(&hash[..8])
}

/// Sanitize a key for use in filenames.
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosscheck_core::workflow::Axis;

    fn job(cache: Option<CacheSettings>) -> JobSpec {
        JobSpec {
            name: "build".to_string(),
            runs_on: Axis::One("ubuntu-latest".to_string()),
            toolchain: None,
            cache,
            steps: vec![],
        }
    }

    #[test]
    fn test_default_namespace_is_job_name() {
        assert_eq!(instance_key(&job(None), "ubuntu-latest"), "build-ubuntu-latest");
    }

    #[test]
    fn test_explicit_namespace() {
        let settings = CacheSettings {
            namespace: Some("lint".to_string()),
            lockfiles: vec![],
        };
        assert_eq!(
            instance_key(&job(Some(settings)), "ubuntu-latest"),
            "lint-ubuntu-latest"
        );
    }

    #[test]
    fn test_distinct_os_values_get_distinct_keys() {
        let linux = instance_key(&job(None), "ubuntu-latest");
        let windows = instance_key(&job(None), "windows-latest");
        assert_ne!(linux, windows);
    }

    #[test]
    fn test_lockfiles_add_stable_fingerprint() {
        let settings = CacheSettings {
            namespace: None,
            lockfiles: vec!["Cargo.lock".to_string()],
        };
        let first = instance_key(&job(Some(settings.clone())), "ubuntu-latest");
        let second = instance_key(&job(Some(settings)), "ubuntu-latest");
        assert_eq!(first, second);
        assert!(first.starts_with("build-ubuntu-latest-"));
    }

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("my/cache/key"), "my_cache_key");
        assert_eq!(sanitize_key("cache:key"), "cache_key");
    }
}
