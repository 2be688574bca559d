use crate::Result;
use std::fmt::{Display, Formatter};
use testcontainers::{ContainerAsync, GenericImage};

/// Host address a fixture container is reachable on from the test process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Resolves the host side of `container_port`.
    ///
    /// `localhost` is pinned to IPv4; the containers only publish on
    /// 0.0.0.0 and some clients try `::1` first.
    pub(crate) async fn of(
        container: &ContainerAsync<GenericImage>,
        container_port: u16,
    ) -> Result<Self> {
        let host = container.get_host().await?.to_string();
        let port = container.get_host_port_ipv4(container_port).await?;
        Ok(Self::new(host, port))
    }

    fn new(host: String, port: u16) -> Self {
        let host = if host == "localhost" {
            String::from("127.0.0.1")
        } else {
            host
        };
        Self { host, port }
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
