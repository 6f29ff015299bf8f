//! Power management via org.freedesktop.login1

use anyhow::Result;
use goblin_ipc::PowerAction;
use zbus::{proxy, Connection};

/// Proxy for systemd-logind
#[proxy(
    interface = "org.freedesktop.login1.Manager",
    default_service = "org.freedesktop.login1",
    default_path = "/org/freedesktop/login1"
)]
trait Login1Manager {
    /// Suspend the system
    fn suspend(&self, interactive: bool) -> zbus::Result<()>;

    /// Hibernate the system
    fn hibernate(&self, interactive: bool) -> zbus::Result<()>;

    /// Power off the system
    fn power_off(&self, interactive: bool) -> zbus::Result<()>;

    /// Reboot the system
    fn reboot(&self, interactive: bool) -> zbus::Result<()>;

    /// Check if can suspend
    fn can_suspend(&self) -> zbus::Result<String>;
}

pub struct PowerService {
    logind: Login1ManagerProxy<'static>,
}

impl PowerService {
    pub async fn new(conn: &Connection) -> Result<Self> {
        let logind = Login1ManagerProxy::new(conn).await?;
        Ok(Self { logind })
    }

    /// Run a power-menu action.
    pub async fn perform(&self, action: PowerAction) -> Result<()> {
        match action {
            PowerAction::Suspend => self.logind.suspend(true).await?,
            PowerAction::Hibernate => self.logind.hibernate(true).await?,
            PowerAction::Reboot => self.logind.reboot(true).await?,
            PowerAction::PowerOff => self.logind.power_off(true).await?,
        }
        Ok(())
    }
}
