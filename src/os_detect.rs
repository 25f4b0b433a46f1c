//! Detects the host OS family by parsing `/etc/os-release`, the same flat
//! `KEY=VALUE` shape the old `root/sshd.rs::get` and `root/ntp.rs::get`
//! already parsed.

use crate::error::{AgentError, Result};
use crate::fs::FileSystem;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsType {
    Ubuntu,
    Rhel,
}

impl OsType {
    #[must_use]
    pub fn config_dir(self) -> &'static str {
        match self {
            OsType::Ubuntu => "/etc/netplan",
            OsType::Rhel => "/etc/sysconfig/network-scripts",
        }
    }
}

pub struct OsDetector<'a> {
    fs: &'a dyn FileSystem,
    in_container: bool,
}

impl<'a> OsDetector<'a> {
    #[must_use]
    pub fn new(fs: &'a dyn FileSystem, in_container: bool) -> Self {
        Self { fs, in_container }
    }

    pub async fn detect(&self) -> Result<OsType> {
        let path = if self.in_container {
            Path::new("/host/etc/os-release")
        } else {
            Path::new("/etc/os-release")
        };
        let contents = self.fs.read_to_string(path).await?;
        Self::parse(&contents)
    }

    fn parse(contents: &str) -> Result<OsType> {
        let id = contents
            .lines()
            .find_map(|line| line.strip_prefix("ID="))
            .map(|v| v.trim_matches('"').to_ascii_lowercase());

        match id.as_deref() {
            Some("ubuntu") => Ok(OsType::Ubuntu),
            Some("rhel") | Some("centos") | Some("rocky") | Some("almalinux") => Ok(OsType::Rhel),
            Some(other) => Err(AgentError::validation(format!(
                "unsupported OS id `{other}`"
            ))),
            None => Err(AgentError::validation("os-release has no ID= line")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::fake::FakeFileSystem;

    #[tokio::test]
    async fn detects_ubuntu() {
        let fs = FakeFileSystem::new();
        fs.seed(
            "/etc/os-release",
            "NAME=\"Ubuntu\"\nID=ubuntu\nVERSION_ID=\"22.04\"\n",
        );
        let detector = OsDetector::new(&fs, false);
        assert_eq!(detector.detect().await.unwrap(), OsType::Ubuntu);
    }

    #[tokio::test]
    async fn detects_rhel() {
        let fs = FakeFileSystem::new();
        fs.seed("/etc/os-release", "NAME=\"Red Hat\"\nID=\"rhel\"\n");
        let detector = OsDetector::new(&fs, false);
        assert_eq!(detector.detect().await.unwrap(), OsType::Rhel);
    }

    #[tokio::test]
    async fn uses_host_prefixed_path_in_container_mode() {
        let fs = FakeFileSystem::new();
        fs.seed("/host/etc/os-release", "ID=ubuntu\n");
        let detector = OsDetector::new(&fs, true);
        assert_eq!(detector.detect().await.unwrap(), OsType::Ubuntu);
    }

    #[tokio::test]
    async fn rejects_unknown_os() {
        let fs = FakeFileSystem::new();
        fs.seed("/etc/os-release", "ID=arch\n");
        let detector = OsDetector::new(&fs, false);
        assert!(detector.detect().await.is_err());
    }
}
