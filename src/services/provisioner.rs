//! Game server provisioning

use crate::config::ServerSettings;
use crate::error::Result;
use crate::types::ConnectionInfo;
use async_trait::async_trait;
use tracing::info;

/// Trait for starting the game server a drafted match plays on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServerProvisioner: Send + Sync {
    /// Start (or reserve) a server and return how to connect to it
    async fn start_server(&self) -> Result<ConnectionInfo>;
}

/// Provisioner that always hands out one configured server
#[derive(Debug, Clone)]
pub struct StaticServerProvisioner {
    info: ConnectionInfo,
}

impl StaticServerProvisioner {
    pub fn new(settings: &ServerSettings) -> Self {
        Self {
            info: ConnectionInfo {
                address: settings.address.clone(),
                password: settings.password.clone(),
            },
        }
    }
}

#[async_trait]
impl ServerProvisioner for StaticServerProvisioner {
    async fn start_server(&self) -> Result<ConnectionInfo> {
        info!("Using static game server {}", self.info.address);
        Ok(self.info.clone())
    }
}
