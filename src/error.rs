use std::fmt;
use std::time::Duration;

#[derive(Debug)]
pub enum PoolError {
    /// Resync input yielded no `rest` endpoint at all. Nothing was changed.
    NoUsableEndpoints,
    Config(String),
    ProbeConnect(std::io::Error),
    ProbeTimeout(Duration),
    /// Health route answered with a non-2xx, non-404 status.
    ProbeStatus { status: u16, body: String },
    Http(reqwest::Error),
    Directory(String),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::NoUsableEndpoints => write!(f, "sync produced no usable endpoints"),
            PoolError::Config(msg) => write!(f, "config error: {}", msg),
            PoolError::ProbeConnect(e) => write!(f, "probe connect error: {}", e),
            PoolError::ProbeTimeout(d) => write!(f, "probe timed out after {}ms", d.as_millis()),
            PoolError::ProbeStatus { status, body } => {
                write!(f, "probe http status: {}, resp: {}", status, body)
            }
            PoolError::Http(e) => write!(f, "http error: {}", e),
            PoolError::Directory(msg) => write!(f, "directory error: {}", msg),
        }
    }
}

impl std::error::Error for PoolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PoolError::ProbeConnect(e) => Some(e),
            PoolError::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for PoolError {
    fn from(e: reqwest::Error) -> Self {
        PoolError::Http(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_no_usable_endpoints() {
        assert_eq!(
            PoolError::NoUsableEndpoints.to_string(),
            "sync produced no usable endpoints"
        );
    }

    #[test]
    fn display_config() {
        assert_eq!(
            PoolError::Config("empty address".to_string()).to_string(),
            "config error: empty address"
        );
    }

    #[test]
    fn display_probe_timeout() {
        assert_eq!(
            PoolError::ProbeTimeout(Duration::from_secs(1)).to_string(),
            "probe timed out after 1000ms"
        );
    }

    #[test]
    fn display_probe_status() {
        let err = PoolError::ProbeStatus {
            status: 503,
            body: "draining".to_string(),
        };
        assert_eq!(err.to_string(), "probe http status: 503, resp: draining");
    }

    #[test]
    fn display_probe_connect_has_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = PoolError::ProbeConnect(io);
        assert_eq!(err.to_string(), "probe connect error: refused");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn display_directory() {
        assert_eq!(
            PoolError::Directory("non-200 response: status=500".to_string()).to_string(),
            "directory error: non-200 response: status=500"
        );
    }
}
