use serde::Deserialize;

use crate::common::types::{CommonError, ToValidate};

use super::{Amqp, App, Bridge, Database, Ledger, Log, Resolver, Router, Workers};

/// Config is the whole daemon configuration, one TOML file shared by every command
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub(super) app: App,

    #[serde(default)]
    pub(super) router: Router,

    #[serde(default)]
    pub(super) bridge: Bridge,

    #[serde(default)]
    pub(super) resolver: Resolver,

    #[serde(default)]
    pub(super) amqp: Amqp,

    #[serde(default)]
    pub(super) database: Database,

    #[serde(default)]
    pub(super) ledger: Ledger,

    #[serde(default)]
    pub(super) workers: Workers,

    #[serde(default)]
    pub(super) log: Log,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn amqp(&self) -> &Amqp {
        &self.amqp
    }

    pub fn db(&self) -> &Database {
        &self.database
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn workers(&self) -> &Workers {
        &self.workers
    }

    pub fn log(&self) -> &Log {
        &self.log
    }
}

impl ToValidate for Config {
    fn validate(&self) -> Result<(), CommonError> {
        self.app.validate()?;
        self.router.validate()?;
        self.bridge.validate()?;
        self.resolver.validate()?;
        self.amqp.validate()?;
        self.database.validate()?;
        self.ledger.validate()?;

        Ok(())
    }
}
