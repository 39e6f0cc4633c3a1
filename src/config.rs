//! Command-line and environment configuration.
//!
//! Every option can also be set through an `EASY_SLIDE_*` environment variable.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Args;

use crate::deck::Segmenter;
use crate::render::Renderer;
use crate::supervisor::{SupervisorConfig, DEFAULT_PROGRAM, DEFAULT_RENDERER_PORT};

/// Log filter used when `RUST_LOG` is unset. Covers rendering server output,
/// which is logged under `easy_slide::renderer`.
pub const DEFAULT_LOG_FILTER: &str = "easy_slide=debug,tower_http=debug";

/// Port the HTTP service listens on.
pub const DEFAULT_PORT: u16 = 8081;

#[derive(Args, Debug, Clone)]
pub struct ListenArgs {
    /// Port for the HTTP service
    #[arg(short, long, env = "EASY_SLIDE_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "EASY_SLIDE_BIND", default_value = "0.0.0.0")]
    pub bind: String,
}

impl ListenArgs {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl Default for ListenArgs {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: "0.0.0.0".to_string(),
        }
    }
}

/// Render decks in-process and serve them as static files.
#[derive(Args, Debug, Clone)]
pub struct StaticArgs {
    #[command(flatten)]
    pub listen: ListenArgs,

    /// Directory holding slide.md and the generated index.html
    #[arg(long, env = "EASY_SLIDE_STATIC_DIR", default_value = "./static")]
    pub dir: PathBuf,

    /// Custom page template containing a {{content}} placeholder
    #[arg(long, env = "EASY_SLIDE_TEMPLATE")]
    pub template: Option<PathBuf>,

    /// Line separating horizontal slides
    #[arg(long, env = "EASY_SLIDE_SEPARATOR", default_value = "---")]
    pub separator: String,

    /// Line separating vertical slides
    #[arg(long, env = "EASY_SLIDE_VERTICAL_SEPARATOR", default_value = "--")]
    pub vertical_separator: String,
}

impl Default for StaticArgs {
    fn default() -> Self {
        Self {
            listen: ListenArgs::default(),
            dir: PathBuf::from("./static"),
            template: None,
            separator: "---".to_string(),
            vertical_separator: "--".to_string(),
        }
    }
}

impl StaticArgs {
    pub fn segmenter(&self) -> Segmenter {
        Segmenter::new(&self.separator, &self.vertical_separator)
    }

    /// Built-in renderer, or one using the `--template` file.
    pub fn renderer(&self) -> anyhow::Result<Renderer> {
        let Some(path) = &self.template else {
            return Ok(Renderer::new());
        };
        let shell = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read template {}", path.display()))?;
        Renderer::with_shell(shell).with_context(|| format!("invalid template {}", path.display()))
    }
}

/// Delegate rendering to an external server and proxy to it.
#[derive(Args, Debug, Clone)]
pub struct ProxyArgs {
    #[command(flatten)]
    pub listen: ListenArgs,

    /// Directory holding slide.md for the rendering server
    #[arg(long, env = "EASY_SLIDE_SLIDES_DIR", default_value = "./slides")]
    pub dir: PathBuf,

    /// Rendering server executable
    #[arg(long, env = "EASY_SLIDE_RENDERER", default_value = DEFAULT_PROGRAM)]
    pub renderer: String,

    /// Port the rendering server binds to
    #[arg(long, env = "EASY_SLIDE_RENDERER_PORT", default_value_t = DEFAULT_RENDERER_PORT)]
    pub renderer_port: u16,

    /// Milliseconds to wait between stopping and restarting the renderer
    #[arg(long, env = "EASY_SLIDE_SETTLE_MS", default_value_t = 1000)]
    pub settle_ms: u64,
}

impl ProxyArgs {
    pub fn supervisor_config(&self, document: PathBuf) -> SupervisorConfig {
        SupervisorConfig {
            program: self.renderer.clone(),
            port: self.renderer_port,
            settle: Duration::from_millis(self.settle_ms),
            ..SupervisorConfig::new(document)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        proxy: ProxyArgs,
    }

    #[test]
    fn proxy_defaults() {
        let cli = TestCli::parse_from(["easy-slide"]);
        let config = cli.proxy.supervisor_config(PathBuf::from("slides/slide.md"));

        assert_eq!(cli.proxy.listen.addr(), "0.0.0.0:8081");
        assert_eq!(config.program, "reveal-md");
        assert_eq!(config.port, 1948);
        assert_eq!(config.settle, Duration::from_millis(1000));
    }

    #[test]
    fn missing_template_is_an_error() {
        let args = StaticArgs {
            template: Some(PathBuf::from("/nonexistent/easy-slide/template.html")),
            ..StaticArgs::default()
        };
        assert!(args.renderer().is_err());
    }
}
