mod amqp;
pub use amqp::{AckMode, Amqp};

mod app;
pub use app::App;

mod bridge;
pub use bridge::Bridge;

mod database;
pub use database::{Backend, Database, RocksDB};

mod ledger;
pub use ledger::Ledger;

mod logger;
pub use logger::{Log, LogFormat};

mod resolver;
pub use resolver::Resolver;

mod router;
pub use router::Router;

mod workers;
pub use workers::Workers;

mod config;
pub use config::Config;

mod parser;
pub use parser::Parser;
