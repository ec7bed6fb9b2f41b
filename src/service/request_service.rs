//! CLI-facing request processing.

use std::io::{self, Read, Write};
use std::process;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{debug, error, info};

use super::FilterPipeline;
use crate::config::Config;
use crate::domain::{Request, Response};

/// Exit code when the request could not be processed.
pub const ERROR_EXIT_CODE: i32 = 1;

/// Drives the pipeline for one JSON request read from stdin.
pub struct RequestService {
    pipeline: FilterPipeline,
}

impl RequestService {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            pipeline: FilterPipeline::new(config)?,
        })
    }

    pub fn pipeline(&self) -> &FilterPipeline {
        &self.pipeline
    }

    /// Read a request from stdin, run it, and print the response as JSON.
    ///
    /// Pipeline failures are printed as `{"error": ...}` and exit with
    /// [`ERROR_EXIT_CODE`].
    pub fn run(&self) -> Result<()> {
        let mut input = String::new();
        io::stdin()
            .read_to_string(&mut input)
            .context("Failed to read request from stdin")?;

        let stdout = io::stdout();
        let mut stdout = stdout.lock();

        if input.trim().is_empty() {
            error!("No input received from stdin");
            writeln!(stdout, "{}", error_json("No input received from stdin"))?;
            process::exit(ERROR_EXIT_CODE);
        }

        debug!("Received input: {}", input);

        let request: Request = match serde_json::from_str(&input) {
            Ok(request) => request,
            Err(e) => {
                let message = format!("Failed to parse request: {}", e);
                error!("{}", message);
                writeln!(stdout, "{}", error_json(&message))?;
                process::exit(ERROR_EXIT_CODE);
            }
        };

        match self.process(request) {
            Ok(response) => {
                let output = serde_json::to_string(&response)?;
                info!("Output: {}", output);
                writeln!(stdout, "{}", output)?;
                Ok(())
            }
            Err(e) => {
                let message = format!("{:#}", e);
                error!("{}", message);
                writeln!(stdout, "{}", error_json(&message))?;
                process::exit(ERROR_EXIT_CODE);
            }
        }
    }

    /// Run one request through the pipeline against [`echo_handler`].
    pub fn process(&self, request: Request) -> Result<Response> {
        Ok(self.pipeline.handle(request, echo_handler)?)
    }

    /// Print the resolved filter set for `method` and `path` as JSON.
    pub fn print_resolved(&self, method: &str, path: &str) -> Result<()> {
        let resolved = self.pipeline.resolve(path, method)?;
        println!("{}", serde_json::to_string_pretty(&resolved)?);
        Ok(())
    }
}

/// Stand-in controller: echoes the request body (or method and path) as HTML.
pub fn echo_handler(request: &Request) -> Result<Response> {
    let body = if request.body.is_empty() {
        format!("{} /{}", request.method, request.path.trim_matches('/'))
    } else {
        request.body.clone()
    };

    Ok(Response::ok(body).with_header("Content-Type", "text/html; charset=UTF-8"))
}

fn error_json(message: &str) -> String {
    json!({ "error": message }).to_string()
}
