use std::path::Path;
use std::process::Command;

use crate::error::{NbpkgError, Result};
use crate::lookaside::LookasideEndpoint;
use crate::ui;
use crate::warning::NbpkgWarning;

/// Talks to a lookaside cache by running `curl`
#[derive(Debug, Clone, Default)]
pub struct CurlTransport {
    quiet: bool,
}

impl CurlTransport {
    pub fn new(quiet: bool) -> Self {
        CurlTransport { quiet }
    }

    /// Certificate options for `endpoint`. Missing files are reported and
    /// left out, so curl fails with the server's own error.
    fn cert_args(endpoint: &LookasideEndpoint) -> Result<Vec<String>> {
        let certs = endpoint.certs.as_ref().ok_or_else(|| {
            NbpkgError::lookaside(format!("No client certificate configured for {}", endpoint.cgi))
        })?;

        let mut args = Vec::new();
        for (flag, path) in [("--cert", &certs.cert), ("--cacert", &certs.ca_cert)] {
            if path.exists() {
                args.push(flag.to_string());
                args.push(path.display().to_string());
            } else {
                ui::display_warning(&NbpkgWarning::MissingCertificate { path: path.clone() });
            }
        }
        Ok(args)
    }

    fn form_args(endpoint: &LookasideEndpoint, module: &str, digest: &str) -> Vec<String> {
        vec![
            "-F".to_string(),
            format!("name={}", module),
            "-F".to_string(),
            format!("{}sum={}", endpoint.hash.name(), digest),
        ]
    }

    /// Arguments for uploading `file` to `endpoint`
    pub fn upload_args(
        &self,
        endpoint: &LookasideEndpoint,
        module: &str,
        file: &Path,
        digest: &str,
    ) -> Result<Vec<String>> {
        let mut args: Vec<String> = ["--fail", "-o", "/dev/null", "--show-error", "--progress-bar"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.extend(Self::cert_args(endpoint)?);
        args.extend(Self::form_args(endpoint, module, digest));
        args.push("-F".to_string());
        args.push(format!("file=@{}", file.display()));
        if self.quiet {
            args.push("-s".to_string());
        }
        args.push(endpoint.cgi.clone());
        Ok(args)
    }

    /// Arguments for asking `endpoint` whether it already has a file
    pub fn exists_args(
        &self,
        endpoint: &LookasideEndpoint,
        module: &str,
        filename: &str,
        digest: &str,
    ) -> Result<Vec<String>> {
        let mut args = vec!["--fail".to_string(), "--show-error".to_string(), "-s".to_string()];
        args.extend(Self::cert_args(endpoint)?);
        args.extend(Self::form_args(endpoint, module, digest));
        args.push("-F".to_string());
        args.push(format!("filename={}", filename));
        args.push(endpoint.cgi.clone());
        Ok(args)
    }

    pub fn upload(&self, endpoint: &LookasideEndpoint, module: &str, file: &Path, digest: &str) -> Result<()> {
        let args = self.upload_args(endpoint, module, file, digest)?;
        tracing::debug!(file = %file.display(), cgi = %endpoint.cgi, "uploading");
        run_status(&args)
    }

    /// Whether `endpoint` already stores `filename` with `digest`
    pub fn remote_file_exists(
        &self,
        endpoint: &LookasideEndpoint,
        module: &str,
        filename: &str,
        digest: &str,
    ) -> Result<bool> {
        let args = self.exists_args(endpoint, module, filename, digest)?;
        let stdout = run_output(&args)?;
        parse_exists_reply(&stdout)
    }

    pub fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let mut args = vec![
            "--fail".to_string(),
            "--show-error".to_string(),
            "-L".to_string(),
            "-o".to_string(),
            dest.display().to_string(),
        ];
        args.push(if self.quiet { "-s" } else { "--progress-bar" }.to_string());
        args.push(url.to_string());
        tracing::debug!(url, dest = %dest.display(), "downloading");
        run_status(&args)
    }
}

/// Interpret the upload CGI's answer to an existence check
pub fn parse_exists_reply(reply: &str) -> Result<bool> {
    match reply.trim() {
        "Available" => Ok(true),
        "Missing" => Ok(false),
        other => Err(NbpkgError::lookaside(format!(
            "Unexpected reply from the lookaside cache: {}",
            other
        ))),
    }
}

fn run_status(args: &[String]) -> Result<()> {
    let status = Command::new("curl")
        .args(args)
        .status()
        .map_err(|e| NbpkgError::command(format!("Failed to run curl: {}", e)))?;

    if !status.success() {
        return Err(NbpkgError::lookaside(format!(
            "curl exited with code {}",
            status.code().unwrap_or(-1)
        )));
    }
    Ok(())
}

fn run_output(args: &[String]) -> Result<String> {
    let output = Command::new("curl")
        .args(args)
        .output()
        .map_err(|e| NbpkgError::command(format!("Failed to run curl: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(NbpkgError::lookaside(format!(
            "curl exited with code {}: {}",
            output.status.code().unwrap_or(-1),
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
