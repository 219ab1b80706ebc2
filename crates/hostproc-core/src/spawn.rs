use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Window show mode for created processes.
///
/// Carried for platforms that have the concept; others ignore it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShowMode {
    Hidden,
    #[default]
    Normal,
    Minimized,
    Maximized,
}

impl ShowMode {
    /// Map the numeric SW_* style codes the classic interface accepted.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ShowMode::Hidden,
            2 | 6 => ShowMode::Minimized,
            3 => ShowMode::Maximized,
            _ => ShowMode::Normal,
        }
    }
}

/// Description of a process to create.
#[derive(Debug, Clone, Default, Builder)]
#[builder(setter(into, strip_option))]
pub struct SpawnSpec {
    /// Program to run.
    pub command: String,
    #[builder(default)]
    #[builder(setter(custom))]
    pub args: Vec<String>,
    #[builder(default)]
    pub working_dir: Option<PathBuf>,
    #[builder(default)]
    pub show_mode: ShowMode,
    #[builder(default)]
    #[builder(setter(custom))]
    pub env: HashMap<String, String>,
}

impl SpawnSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn builder() -> SpawnSpecBuilder {
        SpawnSpecBuilder::default()
    }
}

impl SpawnSpecBuilder {
    pub fn args<S: ToString, I: IntoIterator<Item = S>>(&mut self, iter: I) -> &mut Self {
        let args: Vec<String> = iter.into_iter().map(|s| s.to_string()).collect();
        self.args = Some(args);
        self
    }

    pub fn env<T: ToString>(&mut self, key: T, value: T) -> &mut Self {
        let map = self.env.get_or_insert_with(HashMap::new);
        map.insert(key.to_string(), value.to_string());
        self
    }
}
