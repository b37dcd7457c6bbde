use serde::Deserialize;
use std::path::PathBuf;

/// Config, from a TOML file whose path is the first CLI arg.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// <address>:<port> to serve the blog API and static pages
    pub listen_address: String,

    /// <address>:<port> to serve metrics on
    pub metrics_address: String,

    /// By default, output JSON logs. Only if this flag is set to true, output colourful
    /// human-friendly logs
    pub human_logs: bool,

    /// Max HTTP body size the API accepts (JSON and multipart alike)
    #[serde(default = "max_body_size")]
    pub max_body_size: usize,

    /// Path of the JSON document holding every post
    pub data_file: PathBuf,

    /// Directory where uploaded images are stored, one file per image
    pub upload_dir: PathBuf,

    /// Directory holding the fixed HTML pages (index.html, about.html, contact.html)
    pub pages_dir: PathBuf,
}

impl Config {
    /// Will crash if file isn't found or config is invalid.
    pub fn from_file(filepath: &str) -> Self {
        let contents = std::fs::read_to_string(filepath).expect("Couldn't read from config file");
        toml::from_str(&contents).expect("couldn't parse config file")
    }
}

fn max_body_size() -> usize {
    10 * 1024 * 1024
}
