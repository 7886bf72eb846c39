use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct Workers {
    #[serde(default = "default_concurrency")]
    pub(super) concurrency: usize,

    #[serde(default = "default_connection_timeout")]
    pub(super) connection_timeout_secs: u64,

    #[serde(default = "default_watch_mailbox")]
    pub(super) watch_mailbox: usize,
}

fn default_concurrency() -> usize {
    4
}

fn default_connection_timeout() -> u64 {
    300
}

fn default_watch_mailbox() -> usize {
    64
}

impl Workers {
    pub fn get_concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn get_connection_timeout_secs(&self) -> u64 {
        self.connection_timeout_secs
    }

    pub fn get_watch_mailbox(&self) -> usize {
        self.watch_mailbox
    }
}

impl Default for Workers {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            connection_timeout_secs: default_connection_timeout(),
            watch_mailbox: default_watch_mailbox(),
        }
    }
}
