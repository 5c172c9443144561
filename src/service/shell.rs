//! The client application shell served for every non-API path.

use std::path::{Path, PathBuf};

const PLACEHOLDER_SHELL: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <title>mapkeeper</title>
  </head>
  <body>
    <noscript>You need to enable JavaScript to run this app.</noscript>
    <div id="root"></div>
  </body>
</html>
"#;

/// The shell page plus the optional asset directory next to it.
#[derive(Debug, Clone)]
pub struct ClientShell {
    html: String,
    assets: Option<PathBuf>,
}

impl ClientShell {
    /// Load `index.html` from `client_dir`, or fall back to a placeholder
    /// page so the route never fails.
    pub fn load(client_dir: Option<&Path>) -> Self {
        let Some(dir) = client_dir else {
            return Self::placeholder();
        };

        let index = dir.join("index.html");
        match std::fs::read_to_string(&index) {
            Ok(html) => {
                tracing::info!(path = %index.display(), "Loaded client shell");
                let assets = Some(dir.join("static")).filter(|p| p.is_dir());
                Self { html, assets }
            }
            Err(e) => {
                tracing::warn!(
                    path = %index.display(),
                    error = %e,
                    "Client shell not readable, serving placeholder"
                );
                Self::placeholder()
            }
        }
    }

    /// The built-in placeholder shell.
    pub fn placeholder() -> Self {
        Self { html: PLACEHOLDER_SHELL.to_string(), assets: None }
    }

    /// Shell HTML.
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Directory of static assets, when the client build has one.
    pub fn assets(&self) -> Option<&Path> {
        self.assets.as_deref()
    }
}
