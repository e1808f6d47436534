//! Environment probe: OS family and CPU architecture.
use crate::error::BootstrapError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported operating system families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsFamily {
    Macos,
    Linux,
}

impl OsFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            OsFamily::Macos => "macos",
            OsFamily::Linux => "linux",
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported CPU architectures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X86_64,
    Arm64,
}

impl Arch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::Arm64 => "arm64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Probed platform; immutable for the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub os: OsFamily,
    pub arch: Arch,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

/// Probe the platform this process runs on.
pub fn probe() -> Result<Platform, BootstrapError> {
    classify(std::env::consts::OS, std::env::consts::ARCH)
}

/// Map raw OS and architecture names to a supported platform.
pub fn classify(os: &str, arch: &str) -> Result<Platform, BootstrapError> {
    let unsupported = || BootstrapError::UnsupportedPlatform {
        os: os.to_string(),
        arch: arch.to_string(),
    };
    let os_family = match os {
        "macos" | "darwin" => OsFamily::Macos,
        "linux" => OsFamily::Linux,
        _ => return Err(unsupported()),
    };
    let arch_kind = match arch {
        "x86_64" | "amd64" => Arch::X86_64,
        "aarch64" | "arm64" => Arch::Arm64,
        _ => return Err(unsupported()),
    };
    Ok(Platform {
        os: os_family,
        arch: arch_kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_pairs_classify() {
        for os in ["macos", "linux"] {
            for arch in ["x86_64", "aarch64"] {
                let platform = classify(os, arch).expect("supported platform");
                assert_eq!(platform.os.as_str(), os);
            }
        }
        assert_eq!(
            classify("macos", "aarch64").expect("apple silicon"),
            Platform {
                os: OsFamily::Macos,
                arch: Arch::Arm64
            }
        );
    }

    #[test]
    fn unsupported_pairs_fail() {
        let cases = [
            ("windows", "x86_64"),
            ("freebsd", "x86_64"),
            ("linux", "x86"),
            ("linux", "riscv64"),
            ("macos", "powerpc"),
            ("android", "aarch64"),
        ];
        for (os, arch) in cases {
            match classify(os, arch) {
                Err(BootstrapError::UnsupportedPlatform { os: got_os, arch: got_arch }) => {
                    assert_eq!(got_os, os);
                    assert_eq!(got_arch, arch);
                }
                other => panic!("expected UnsupportedPlatform for {os}/{arch}, got {other:?}"),
            }
        }
    }

    #[test]
    fn platform_displays_as_os_slash_arch() {
        let platform = classify("linux", "x86_64").expect("linux");
        assert_eq!(platform.to_string(), "linux/x86_64");
    }
}
