use serde::Deserialize;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Log {
    #[serde(default)]
    pub(super) format: LogFormat,
}

impl Log {
    pub fn get_format(&self) -> LogFormat {
        self.format
    }
}
