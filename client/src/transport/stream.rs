use std::{
    io::{self, Read, Write},
    net::{Shutdown, TcpStream},
    sync::Arc,
};

use obus_shared::ObusAddress;

use super::{Connector, Socket};

impl Socket for TcpStream {
    fn read(&self, buffer: &mut [u8]) -> io::Result<usize> {
        Read::read(&mut &*self, buffer)
    }

    fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        Write::write_all(&mut &*self, bytes)
    }

    fn shutdown(&self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

cfg_if! {
    if #[cfg(unix)] {
        use std::os::unix::net::UnixStream;

        impl Socket for UnixStream {
            fn read(&self, buffer: &mut [u8]) -> io::Result<usize> {
                Read::read(&mut &*self, buffer)
            }

            fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
                Write::write_all(&mut &*self, bytes)
            }

            fn shutdown(&self) -> io::Result<()> {
                UnixStream::shutdown(self, Shutdown::Both)
            }
        }

        fn connect_unix(path: &str) -> io::Result<Arc<dyn Socket>> {
            match path.strip_prefix('@') {
                Some(name) => connect_abstract(name),
                None => Ok(Arc::new(UnixStream::connect(path)?)),
            }
        }
    } else {
        fn connect_unix(path: &str) -> io::Result<Arc<dyn Socket>> {
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("unix socket '{}' not supported on this platform", path),
            ))
        }
    }
}

cfg_if! {
    if #[cfg(target_os = "linux")] {
        fn connect_abstract(name: &str) -> io::Result<Arc<dyn Socket>> {
            use std::os::{linux::net::SocketAddrExt, unix::net::SocketAddr};

            let address = SocketAddr::from_abstract_name(name.as_bytes())?;
            Ok(Arc::new(UnixStream::connect_addr(&address)?))
        }
    } else if #[cfg(unix)] {
        fn connect_abstract(name: &str) -> io::Result<Arc<dyn Socket>> {
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("abstract socket '@{}' not supported on this platform", name),
            ))
        }
    }
}

/// Connects with the operating system sockets: TCP for `inet` addresses,
/// unix domain stream sockets for `unix` ones.
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemConnector;

impl Connector for SystemConnector {
    fn connect(&self, address: &ObusAddress) -> io::Result<Arc<dyn Socket>> {
        match address {
            ObusAddress::Inet { host, port } => {
                let stream = TcpStream::connect((host.as_str(), *port))?;
                stream.set_nodelay(true)?;
                Ok(Arc::new(stream))
            }
            ObusAddress::Unix(path) => connect_unix(path),
        }
    }
}
