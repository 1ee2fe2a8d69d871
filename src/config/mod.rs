// config module: TOML settings loaded and saved on behalf of the host

pub mod loader;
pub mod types;

pub use loader::{default_config_path, load_config, save_config};
pub use types::{AppConfig, GitHubConfig, Presets, SubmitDefaults, TokenHistory};
