//! Socket addresses and transport-neutral stream halves.
//!
//! Two address forms are understood:
//! - `local:/path/to/socket` (Unix domain socket, unix only)
//! - `inet:host:port` (TCP)

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::net::UnixListener;

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

#[derive(Error, Debug)]
pub enum AddressError {
    #[error("Invalid socket address: {0}")]
    Invalid(String),
    #[error("Unix domain sockets are not supported on this platform")]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    Local(PathBuf),
    Inet(String),
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        if let Some(path) = text.strip_prefix("local:") {
            if path.is_empty() {
                return Err(AddressError::Invalid(text.to_string()));
            }
            return Ok(Address::Local(PathBuf::from(path)));
        }
        if let Some(host_port) = text.strip_prefix("inet:") {
            match host_port.rsplit_once(':') {
                Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                    return Ok(Address::Inet(host_port.to_string()));
                }
                _ => return Err(AddressError::Invalid(text.to_string())),
            }
        }
        Err(AddressError::Invalid(text.to_string()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Local(path) => write!(f, "local:{}", path.display()),
            Address::Inet(host_port) => write!(f, "inet:{}", host_port),
        }
    }
}

/// Bound listening socket.
pub enum Listener {
    #[cfg(unix)]
    Unix {
        listener: UnixListener,
        path: PathBuf,
        /// (device, inode) of the socket file this listener created.
        file_id: Option<(u64, u64)>,
    },
    Tcp(TcpListener),
}

#[cfg(unix)]
fn socket_file_id(path: &std::path::Path) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;
    std::fs::symlink_metadata(path).ok().map(|meta| (meta.dev(), meta.ino()))
}

impl Listener {
    /// Bind `address`. A stale Unix socket file is replaced; one with a live
    /// server behind it is left alone and the bind fails with `AddrInUse`.
    pub async fn bind(address: &Address) -> Result<Self, std::io::Error> {
        match address {
            #[cfg(unix)]
            Address::Local(path) => {
                if path.exists() {
                    if tokio::net::UnixStream::connect(path).await.is_ok() {
                        return Err(std::io::Error::new(
                            std::io::ErrorKind::AddrInUse,
                            format!("a server is already listening on {}", path.display()),
                        ));
                    }
                    let _ = std::fs::remove_file(path);
                }
                let listener = UnixListener::bind(path)?;
                let file_id = socket_file_id(path);
                Ok(Listener::Unix { listener, path: path.clone(), file_id })
            }
            #[cfg(not(unix))]
            Address::Local(_) => Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                AddressError::Unsupported,
            )),
            Address::Inet(host_port) => Ok(Listener::Tcp(TcpListener::bind(host_port.as_str()).await?)),
        }
    }

    pub async fn accept(&self) -> Result<(BoxedReader, BoxedWriter), std::io::Error> {
        match self {
            #[cfg(unix)]
            Listener::Unix { listener, .. } => {
                let (stream, _) = listener.accept().await?;
                let (reader, writer) = stream.into_split();
                Ok((Box::new(reader), Box::new(writer)))
            }
            Listener::Tcp(listener) => {
                let (stream, _) = listener.accept().await?;
                stream.set_nodelay(true)?;
                let (reader, writer) = stream.into_split();
                Ok((Box::new(reader), Box::new(writer)))
            }
        }
    }

    /// Address peers can connect to; resolves an ephemeral TCP port.
    pub fn local_address(&self) -> Result<Address, std::io::Error> {
        match self {
            #[cfg(unix)]
            Listener::Unix { path, .. } => Ok(Address::Local(path.clone())),
            Listener::Tcp(listener) => Ok(Address::Inet(listener.local_addr()?.to_string())),
        }
    }
}

#[cfg(unix)]
impl Drop for Listener {
    fn drop(&mut self) {
        // Only remove the file if it is still ours, not a successor's.
        if let Listener::Unix { path, file_id: Some(id), .. } = self {
            if socket_file_id(path) == Some(*id) {
                let _ = std::fs::remove_file(path);
            }
        }
    }
}

/// Open a stream to `address`.
pub async fn connect(address: &Address) -> Result<(BoxedReader, BoxedWriter), std::io::Error> {
    match address {
        #[cfg(unix)]
        Address::Local(path) => {
            let stream = tokio::net::UnixStream::connect(path).await?;
            let (reader, writer) = stream.into_split();
            Ok((Box::new(reader), Box::new(writer)))
        }
        #[cfg(not(unix))]
        Address::Local(_) => Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            AddressError::Unsupported,
        )),
        Address::Inet(host_port) => {
            let stream = tokio::net::TcpStream::connect(host_port.as_str()).await?;
            stream.set_nodelay(true)?;
            let (reader, writer) = stream.into_split();
            Ok((Box::new(reader), Box::new(writer)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_local() {
        let addr: Address = "local:/tmp/ime.sock".parse().unwrap();
        assert_eq!(addr, Address::Local(PathBuf::from("/tmp/ime.sock")));
        assert_eq!(addr.to_string(), "local:/tmp/ime.sock");
    }

    #[test]
    fn test_parse_inet() {
        let addr: Address = "inet:127.0.0.1:9000".parse().unwrap();
        assert_eq!(addr, Address::Inet("127.0.0.1:9000".into()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bind_refuses_live_socket() {
        let dir = tempfile::tempdir().unwrap();
        let address = Address::Local(dir.path().join("frontend.sock"));
        let first = Listener::bind(&address).await.unwrap();

        let second = Listener::bind(&address).await;
        assert_eq!(second.err().map(|e| e.kind()), Some(std::io::ErrorKind::AddrInUse));

        // The live listener still accepts.
        let (_connected, accepted) = tokio::join!(connect(&address), first.accept());
        assert!(accepted.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bind_replaces_stale_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frontend.sock");
        drop(std::os::unix::net::UnixListener::bind(&path).unwrap());
        assert!(path.exists());

        let listener = Listener::bind(&Address::Local(path.clone())).await.unwrap();
        drop(listener);
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_drop_leaves_successor_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frontend.sock");
        let address = Address::Local(path.clone());
        let first = Listener::bind(&address).await.unwrap();

        std::fs::remove_file(&path).unwrap();
        let second = Listener::bind(&address).await.unwrap();
        drop(first);
        assert!(path.exists());
        assert!(connect(&address).await.is_ok());
        drop(second);
        assert!(!path.exists());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "local:", "inet:host", "inet::80", "inet:host:99999", "tcp:1.2.3.4:5"] {
            assert!(bad.parse::<Address>().is_err(), "accepted {bad:?}");
        }
    }
}
