use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Remote tier backend types
///
/// Selects which object store implementation backs the durable remote tier.
/// `Memory` is intended for tests and dry runs; nothing survives the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteBackend {
    S3,
    Local,
    Memory,
}

impl FromStr for RemoteBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "s3" => Ok(RemoteBackend::S3),
            "local" => Ok(RemoteBackend::Local),
            "memory" => Ok(RemoteBackend::Memory),
            _ => Err(anyhow::anyhow!("Invalid remote storage backend: {}", s)),
        }
    }
}

impl Display for RemoteBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            RemoteBackend::S3 => write!(f, "s3"),
            RemoteBackend::Local => write!(f, "local"),
            RemoteBackend::Memory => write!(f, "memory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("S3".parse::<RemoteBackend>().unwrap(), RemoteBackend::S3);
        assert_eq!("memory".parse::<RemoteBackend>().unwrap(), RemoteBackend::Memory);
        assert!("azure".parse::<RemoteBackend>().is_err());
    }
}
